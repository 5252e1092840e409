//! Citation-graph datasets loaded from their raw distribution files.
//!
//! | Dataset  | Nodes  | Features | Classes |
//! |----------|--------|----------|---------|
//! | Cora     | 2,708  | 1,433    | 7       |
//! | CiteSeer | 3,312  | 3,703    | 6       |
//! | PubMed   | 19,717 | 500      | 3       |
//!
//! Cora has 10,556 directed edges after symmetrisation.
//!
//! Cora and CiteSeer use the LINQS `.content` / `.cites` pair; PubMed uses the
//! `Pubmed-Diabetes` tab files. All loaders produce the same shape of graph:
//!
//! - nodes in file order
//! - edges symmetrised, deduplicated, without self-loops
//! - citations naming unknown papers skipped
//! - features row-normalised
//! - labels numbered by sorted class name
//!
//! Files are looked up in `<root>/<name>/raw`, `<root>/<name>`, then `<root>`.

mod linqs;
mod pubmed;

use crate::norm::row_normalize;
use crate::{EdgeIndex, Error, Graph, Result};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use linqs::load_linqs;
pub use pubmed::load_pubmed;

/// Supported citation datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    Cora,
    CiteSeer,
    PubMed,
}

impl Dataset {
    pub const ALL: [Dataset; 3] = [Dataset::Cora, Dataset::CiteSeer, Dataset::PubMed];

    /// Lower-case name, also the dataset directory name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cora => "cora",
            Self::CiteSeer => "citeseer",
            Self::PubMed => "pubmed",
        }
    }

    /// Raw files that must exist for this dataset.
    pub fn raw_file_names(&self) -> [&'static str; 2] {
        match self {
            Self::Cora => ["cora.content", "cora.cites"],
            Self::CiteSeer => ["citeseer.content", "citeseer.cites"],
            Self::PubMed => [
                "Pubmed-Diabetes.NODE.paper.tab",
                "Pubmed-Diabetes.DIRECTED.cites.tab",
            ],
        }
    }

    /// Directory under `root` holding the raw files.
    pub fn raw_dir(&self, root: &Path) -> Result<PathBuf> {
        let [first, _] = self.raw_file_names();
        let candidates = [
            root.join(self.name()).join("raw"),
            root.join(self.name()),
            root.to_path_buf(),
        ];
        candidates
            .iter()
            .find(|dir| dir.join(first).is_file())
            .cloned()
            .ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} not found under {}", first, root.display()),
                ))
            })
    }

    /// Load the dataset from `root`.
    pub fn load(&self, root: impl AsRef<Path>) -> Result<Graph> {
        let dir = self.raw_dir(root.as_ref())?;
        let [nodes, edges] = self.raw_file_names();
        let graph = match self {
            Self::Cora | Self::CiteSeer => load_linqs(dir.join(nodes), dir.join(edges))?,
            Self::PubMed => load_pubmed(dir.join(nodes), dir.join(edges))?,
        };
        let stats = graph.stats();
        tracing::info!(
            dataset = self.name(),
            nodes = stats.num_nodes,
            edges = stats.num_edges,
            features = stats.num_features,
            classes = stats.num_classes,
            "loaded dataset"
        );
        Ok(graph)
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cora => "Cora",
            Self::CiteSeer => "CiteSeer",
            Self::PubMed => "PubMed",
        })
    }
}

impl FromStr for Dataset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cora" => Ok(Self::Cora),
            "citeseer" => Ok(Self::CiteSeer),
            "pubmed" => Ok(Self::PubMed),
            _ => Err(Error::UnknownDataset(s.to_string())),
        }
    }
}

/// Accumulates papers and citations while a raw file is parsed.
pub(crate) struct RawGraphBuilder {
    ids: HashMap<String, u32>,
    features: Vec<f32>,
    num_features: usize,
    labels: Vec<String>,
    citations: Vec<(u32, u32)>,
    skipped_citations: usize,
}

impl RawGraphBuilder {
    pub(crate) fn new(num_features: usize) -> Self {
        Self {
            ids: HashMap::new(),
            features: Vec::new(),
            num_features,
            labels: Vec::new(),
            citations: Vec::new(),
            skipped_citations: 0,
        }
    }

    pub(crate) fn num_features(&self) -> usize {
        self.num_features
    }

    /// Register a paper. Returns `false` if the id was already present.
    pub(crate) fn add_node(&mut self, id: &str, features: Vec<f32>, label: String) -> bool {
        debug_assert_eq!(features.len(), self.num_features);
        if self.ids.contains_key(id) {
            return false;
        }
        self.ids.insert(id.to_string(), self.labels.len() as u32);
        self.features.extend(features);
        self.labels.push(label);
        true
    }

    /// Register a citation between two paper ids; unknown ids are counted and
    /// skipped.
    pub(crate) fn add_citation(&mut self, a: &str, b: &str) {
        match (self.ids.get(a), self.ids.get(b)) {
            (Some(&a), Some(&b)) => self.citations.push((a, b)),
            _ => self.skipped_citations += 1,
        }
    }

    pub(crate) fn finish(self) -> Result<Graph> {
        let classes: BTreeSet<&str> = self.labels.iter().map(String::as_str).collect();
        let class_index: HashMap<&str, u32> = classes
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, i as u32))
            .collect();
        let labels = self.labels.iter().map(|l| class_index[l.as_str()]).collect();

        if self.skipped_citations > 0 {
            tracing::debug!(
                skipped = self.skipped_citations,
                "citations referencing unknown papers were skipped"
            );
        }

        let num_nodes = self.ids.len();
        let mut features = self.features;
        row_normalize(&mut features, self.num_features);
        let edges = EdgeIndex::from_pairs(self.citations).to_undirected();
        Graph::new(features, num_nodes, self.num_features, edges)?.with_labels(labels, classes.len())
    }
}

pub(crate) fn parse_error(path: &Path, line: usize, message: impl Into<String>) -> Error {
    Error::Parse {
        path: path.to_path_buf(),
        line,
        message: message.into(),
    }
}

/// Open a raw file; failures name the file.
pub(crate) fn open_raw(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| parse_error(path, 0, format!("cannot open: {}", e)))
}
