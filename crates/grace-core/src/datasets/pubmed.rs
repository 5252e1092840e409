//! `Pubmed-Diabetes` tab format.
//!
//! ```text
//! NODE\tpaper
//! cat=1,2,3:label\tnumeric:w-rat:0.0\tnumeric:w-common:0.0\t...\tstring:summary
//! 12187484\tlabel=1\tw-rat=0.0936\tw-common=0.0285\t...\tsummary=w-rat,...
//! ```
//!
//! ```text
//! DIRECTED\tcites
//! NO_FEATURES
//! 33824\tpaper:19127292\t|\tpaper:17363749
//! ```
//!
//! Feature columns follow the order of the `numeric:` declarations in the
//! second header line; absent words are zero.

use super::{open_raw, parse_error, RawGraphBuilder};
use crate::{Graph, Result};
use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;

const NODE_HEADER_LINES: usize = 2;
const CITES_HEADER_LINES: usize = 2;

/// Load PubMed from its node and citation tab files.
pub fn load_pubmed(nodes: impl AsRef<Path>, cites: impl AsRef<Path>) -> Result<Graph> {
    let nodes = nodes.as_ref();
    let cites = cites.as_ref();

    let mut lines = BufReader::new(open_raw(nodes)?).lines();
    lines.next().transpose()?;
    let header = lines
        .next()
        .transpose()?
        .ok_or_else(|| parse_error(nodes, 2, "missing feature declarations"))?;

    let vocab: HashMap<String, usize> = header
        .split('\t')
        .filter_map(|decl| decl.strip_prefix("numeric:"))
        .filter_map(|decl| decl.split(':').next())
        .enumerate()
        .map(|(i, word)| (word.to_string(), i))
        .collect();
    if vocab.is_empty() {
        return Err(parse_error(nodes, 2, "no numeric feature declarations"));
    }

    let mut builder = RawGraphBuilder::new(vocab.len());
    for (idx, line) in lines.enumerate() {
        let line = line?;
        let lineno = idx + NODE_HEADER_LINES + 1;
        let mut fields = line.split('\t').filter(|f| !f.is_empty());
        let Some(id) = fields.next() else { continue };

        let mut label = None;
        let mut features = vec![0.0f32; vocab.len()];
        for field in fields {
            let Some((key, value)) = field.split_once('=') else {
                return Err(parse_error(nodes, lineno, format!("malformed field {:?}", field)));
            };
            match key {
                "label" => label = Some(value.to_string()),
                "summary" => {}
                word => {
                    let col = *vocab.get(word).ok_or_else(|| {
                        parse_error(nodes, lineno, format!("undeclared feature {}", word))
                    })?;
                    features[col] = value.parse().map_err(|e| {
                        parse_error(nodes, lineno, format!("bad value for {}: {}", word, e))
                    })?;
                }
            }
        }

        let label = label.ok_or_else(|| parse_error(nodes, lineno, "missing label"))?;
        if !builder.add_node(id, features, label) {
            return Err(parse_error(nodes, lineno, format!("duplicate paper id {}", id)));
        }
    }

    let reader = BufReader::new(open_raw(cites)?);
    for (idx, line) in reader.lines().enumerate().skip(CITES_HEADER_LINES) {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let papers: Vec<&str> = line
            .split('\t')
            .filter_map(|f| f.strip_prefix("paper:"))
            .collect();
        match papers.as_slice() {
            [a, b] => builder.add_citation(a, b),
            _ => return Err(parse_error(cites, idx + 1, "expected two paper: fields")),
        }
    }

    builder.finish()
}
