//! Command-line interface for the osmplace importer.
//!
//! Streams an OSM PBF file sequentially through the import pipeline and
//! writes the resulting `place` rows as COPY text to stdout or a file.

#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{self, BufWriter, Write};

use camino::Utf8PathBuf;
use clap::Parser;
use log::info;
use osmpbf::{Element, ElementReader, RelMemberType};
use thiserror::Error;

use osmplace_core::{
    Coordinate, ImportOptions, Node, ObjectMeta, ObjectType, RelMember, Relation, TagList, Way,
    PROJ_LATLONG, PROJ_SPHERE_MERC,
};
use osmplace_import::pipeline::{ImportError, Importer};

/// Run the importer with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    env_logger::init();
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let options = cli.to_options()?;

    match &cli.output {
        Some(path) => {
            let file = File::create(path).map_err(|source| CliError::CreateOutput {
                path: path.clone(),
                source,
            })?;
            run_import(&options, &cli.input, BufWriter::new(file))
        }
        None => run_import(&options, &cli.input, io::stdout().lock()),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "osmplace",
    about = "Import OpenStreetMap data into geocoding database COPY streams",
    version
)]
struct Cli {
    /// OSM PBF input file.
    input: Utf8PathBuf,
    /// Gazetteer style file controlling tag classification.
    #[arg(long, value_name = "path")]
    style: Utf8PathBuf,
    /// Flat node file for the persistent coordinate cache.
    #[arg(long = "flat-nodes", value_name = "path")]
    flat_nodes: Option<Utf8PathBuf>,
    /// Update an existing import instead of starting fresh.
    #[arg(long)]
    append: bool,
    /// Keep output coordinates in WGS84 latitude/longitude.
    #[arg(long, group = "projection")]
    latlong: bool,
    /// Project output to spherical Mercator (the default).
    #[arg(long, group = "projection")]
    merc: bool,
    /// Project output to the given EPSG code.
    #[arg(long, value_name = "epsg", group = "projection")]
    proj: Option<i32>,
    /// Maximum linestring length in target units before splitting.
    #[arg(long = "split-at", value_name = "distance")]
    split_at: Option<f64>,
    /// COPY text output file; stdout when omitted.
    #[arg(long, value_name = "path")]
    output: Option<Utf8PathBuf>,
}

impl Cli {
    fn to_options(&self) -> Result<ImportOptions, CliError> {
        if self.append && self.flat_nodes.is_none() {
            return Err(CliError::AppendWithoutFlatNodes);
        }
        let mut options = ImportOptions::new(self.style.as_std_path());
        options.projection = if self.latlong {
            PROJ_LATLONG
        } else if let Some(epsg) = self.proj {
            -epsg
        } else {
            PROJ_SPHERE_MERC
        };
        options.flat_node_path = self
            .flat_nodes
            .as_ref()
            .map(|path| path.as_std_path().to_path_buf());
        options.append = self.append;
        options.split_at = self.split_at;
        Ok(options)
    }
}

fn run_import<W: Write>(
    options: &ImportOptions,
    input: &Utf8PathBuf,
    sink: W,
) -> Result<(), CliError> {
    let mut importer = Importer::new(options, sink)?;

    let reader = ElementReader::from_path(input).map_err(|source| CliError::OpenPbf {
        path: input.clone(),
        source,
    })?;

    let mut failure: Option<ImportError> = None;
    reader
        .for_each(|element| {
            if failure.is_some() {
                return;
            }
            if let Err(err) = handle_element(&mut importer, element) {
                failure = Some(err);
            }
        })
        .map_err(|source| CliError::DecodePbf {
            path: input.clone(),
            source,
        })?;
    if let Some(err) = failure {
        return Err(err.into());
    }

    let summary = importer.finish()?;
    info!(
        "import finished: {} nodes, {} ways, {} relations, {} rows",
        summary.nodes, summary.ways, summary.relations, summary.rows
    );
    Ok(())
}

fn handle_element<W: Write>(
    importer: &mut Importer<W>,
    element: Element<'_>,
) -> Result<(), ImportError> {
    match element {
        Element::Node(node) => {
            let mut n = Node::new(
                node.id(),
                Coordinate::new(node.lon(), node.lat()),
                collect_tags(node.tags()),
            );
            let info = node.info();
            n.meta = ObjectMeta {
                version: info.version(),
                timestamp: info.milli_timestamp().map(|ms| ms / 1000),
                changeset: info.changeset(),
                uid: info.uid().map(i64::from),
                user: info.user().and_then(Result::ok).map(str::to_owned),
            };
            importer.add_node(&n)
        }
        Element::DenseNode(node) => {
            let mut n = Node::new(
                node.id(),
                Coordinate::new(node.lon(), node.lat()),
                collect_tags(node.tags()),
            );
            if let Some(info) = node.info() {
                n.meta = ObjectMeta {
                    version: Some(info.version()),
                    timestamp: Some(info.milli_timestamp() / 1000),
                    changeset: Some(info.changeset()),
                    uid: Some(i64::from(info.uid())),
                    user: info.user().ok().map(str::to_owned),
                };
            }
            importer.add_node(&n)
        }
        Element::Way(way) => {
            let mut w = Way::new(way.id(), way.refs().collect(), collect_tags(way.tags()));
            let info = way.info();
            w.meta = ObjectMeta {
                version: info.version(),
                timestamp: info.milli_timestamp().map(|ms| ms / 1000),
                changeset: info.changeset(),
                uid: info.uid().map(i64::from),
                user: info.user().and_then(Result::ok).map(str::to_owned),
            };
            importer.add_way(&w)
        }
        Element::Relation(rel) => {
            let members = rel
                .members()
                .map(|member| {
                    let mtype = match member.member_type {
                        RelMemberType::Node => ObjectType::Node,
                        RelMemberType::Way => ObjectType::Way,
                        RelMemberType::Relation => ObjectType::Relation,
                    };
                    RelMember::new(mtype, member.member_id, member.role().unwrap_or(""))
                })
                .collect();
            let mut r = Relation::new(rel.id(), members, collect_tags(rel.tags()));
            let info = rel.info();
            r.meta = ObjectMeta {
                version: info.version(),
                timestamp: info.milli_timestamp().map(|ms| ms / 1000),
                changeset: info.changeset(),
                uid: info.uid().map(i64::from),
                user: info.user().and_then(Result::ok).map(str::to_owned),
            };
            importer.add_relation(&r)
        }
    }
}

fn collect_tags<'a>(tags: impl Iterator<Item = (&'a str, &'a str)>) -> TagList {
    tags.collect()
}

/// Errors emitted by the osmplace CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Append mode has nothing to append to without a flat node file.
    #[error("--append requires --flat-nodes")]
    AppendWithoutFlatNodes,
    #[error("failed to open OSM PBF file at {path}")]
    OpenPbf {
        path: Utf8PathBuf,
        #[source]
        source: osmpbf::Error,
    },
    #[error("failed to decode OSM PBF data at {path}")]
    DecodePbf {
        path: Utf8PathBuf,
        #[source]
        source: osmpbf::Error,
    },
    #[error("failed to create output file at {path}")]
    CreateOutput {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Import(#[from] ImportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("arguments parse")
    }

    #[test]
    fn defaults_to_spherical_mercator() {
        let cli = parse(&["osmplace", "--style", "s.json", "planet.osm.pbf"]);
        let options = cli.to_options().expect("options resolve");
        assert_eq!(options.projection, PROJ_SPHERE_MERC);
        assert!(!options.append);
        assert!(options.flat_node_path.is_none());
    }

    #[test]
    fn latlong_flag_selects_passthrough() {
        let cli = parse(&["osmplace", "--style", "s.json", "--latlong", "in.pbf"]);
        assert_eq!(cli.to_options().unwrap().projection, PROJ_LATLONG);
    }

    #[test]
    fn epsg_codes_are_negative_projection_ids() {
        let cli = parse(&["osmplace", "--style", "s.json", "--proj", "32633", "in.pbf"]);
        assert_eq!(cli.to_options().unwrap().projection, -32633);
    }

    #[test]
    fn projection_flags_are_mutually_exclusive() {
        assert!(Cli::try_parse_from([
            "osmplace", "--style", "s.json", "--latlong", "--merc", "in.pbf"
        ])
        .is_err());
    }

    #[test]
    fn append_requires_flat_nodes() {
        let cli = parse(&["osmplace", "--style", "s.json", "--append", "in.pbf"]);
        assert!(matches!(
            cli.to_options(),
            Err(CliError::AppendWithoutFlatNodes)
        ));

        let cli = parse(&[
            "osmplace",
            "--style",
            "s.json",
            "--append",
            "--flat-nodes",
            "flat.nodes",
            "in.pbf",
        ]);
        let options = cli.to_options().expect("options resolve");
        assert!(options.append);
        assert!(options.flat_node_path.is_some());
    }
}
