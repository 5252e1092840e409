//! LINQS `.content` / `.cites` format (Cora, CiteSeer).
//!
//! ```text
//! <paper_id> <word_attributes>+ <class_label>      (.content)
//! <cited_paper_id> <citing_paper_id>               (.cites)
//! ```

use super::{open_raw, parse_error, RawGraphBuilder};
use crate::{Graph, Result};
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Load a graph from a `.content` and a `.cites` file.
pub fn load_linqs(content: impl AsRef<Path>, cites: impl AsRef<Path>) -> Result<Graph> {
    let content = content.as_ref();
    let cites = cites.as_ref();

    let mut builder: Option<RawGraphBuilder> = None;
    let reader = BufReader::new(open_raw(content)?);
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        let lineno = idx + 1;
        if tokens.len() < 3 {
            return Err(parse_error(content, lineno, "expected id, features and label"));
        }

        let width = tokens.len() - 2;
        let b = builder.get_or_insert_with(|| RawGraphBuilder::new(width));
        if width != b.num_features() {
            return Err(parse_error(
                content,
                lineno,
                format!("{} features, expected {}", width, b.num_features()),
            ));
        }

        let features = tokens[1..=width]
            .iter()
            .map(|t| {
                t.parse::<f32>()
                    .map_err(|e| parse_error(content, lineno, format!("bad feature {:?}: {}", t, e)))
            })
            .collect::<Result<Vec<f32>>>()?;

        if !b.add_node(tokens[0], features, tokens[width + 1].to_string()) {
            return Err(parse_error(
                content,
                lineno,
                format!("duplicate paper id {}", tokens[0]),
            ));
        }
    }

    let mut builder = builder.ok_or_else(|| parse_error(content, 0, "no papers found"))?;

    let reader = BufReader::new(open_raw(cites)?);
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let mut tokens = line.split_whitespace();
        match (tokens.next(), tokens.next()) {
            (None, _) => continue,
            (Some(cited), Some(citing)) => builder.add_citation(cited, citing),
            (Some(_), None) => {
                return Err(parse_error(cites, idx + 1, "expected two paper ids"));
            }
        }
    }

    builder.finish()
}
