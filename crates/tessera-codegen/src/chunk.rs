//! Reading emitted chunks back, and ordering them for loading.

use std::collections::HashMap;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use tessera_core::syntax::ast::{PropKey, Property};
use tessera_core::syntax::{parse_expression_prefix, Expr};

use crate::error::CodegenError;
use crate::render::{IntermediateChunk, BODY_PREFIX, EXPORT_LINE, REQUIRES_PREFIX, SOURCE_PREFIX};

/// A chunk's text parsed back into expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedChunk {
    pub source: String,
    pub requires: Vec<String>,
    pub entries: Vec<(String, Expr)>,
}

/// Parses chunk text produced by the renderer.
pub fn parse_chunk(text: &str) -> Result<ParsedChunk, CodegenError> {
    let mut source = None;
    let mut requires = None;
    let Some(body_start) = text.find(BODY_PREFIX) else {
        return Err(malformed("<unknown>", "missing `const all` declaration"));
    };
    for line in text[..body_start].lines() {
        if let Some(rest) = line.strip_prefix(SOURCE_PREFIX) {
            source = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix(REQUIRES_PREFIX) {
            let list: Vec<String> = serde_json::from_str(rest.trim()).map_err(|err| {
                malformed(source.as_deref().unwrap_or("<unknown>"), &format!("bad requires list: {err}"))
            })?;
            requires = Some(list);
        }
    }
    let source = source.ok_or_else(|| malformed("<unknown>", "missing source header"))?;

    let body = &text[body_start + BODY_PREFIX.len()..];
    let (table, end) =
        parse_expression_prefix(body).map_err(|err| malformed(&source, &err.to_string()))?;
    let Expr::Object(props) = table else {
        return Err(malformed(&source, "`all` is not an object literal"));
    };
    let mut entries = Vec::with_capacity(props.len());
    for prop in props {
        match prop {
            Property::KeyValue {
                key: PropKey::Str(id),
                value,
            } => entries.push((id, value)),
            _ => return Err(malformed(&source, "entries must be string-keyed")),
        }
    }

    let tail = body[end..].trim_start();
    let Some(tail) = tail.strip_prefix(';') else {
        return Err(malformed(&source, "expected `;` after `all`"));
    };
    if tail.trim() != EXPORT_LINE {
        return Err(malformed(&source, "missing evaluation export"));
    }

    Ok(ParsedChunk {
        source,
        requires: requires.unwrap_or_default(),
        entries,
    })
}

fn malformed(chunk: &str, message: &str) -> CodegenError {
    CodegenError::MalformedChunk {
        chunk: chunk.to_string(),
        message: message.to_string(),
    }
}

/// Orders chunks so that required chunks load first.
///
/// Mutually requiring chunks stay together in id order; the loader's cycle
/// policy decides whether such a group can be evaluated.
pub fn order_chunks(chunks: &[IntermediateChunk]) -> Vec<&IntermediateChunk> {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let mut by_id: HashMap<&str, NodeIndex> = HashMap::new();
    for (i, chunk) in chunks.iter().enumerate() {
        by_id.insert(chunk.id.as_str(), graph.add_node(i));
    }
    for chunk in chunks {
        let from = by_id[chunk.id.as_str()];
        for required in &chunk.requires {
            if let Some(to) = by_id.get(required.as_str()) {
                graph.add_edge(from, *to, ());
            }
        }
    }

    let mut ordered = Vec::with_capacity(chunks.len());
    for component in tarjan_scc(&graph) {
        let mut members: Vec<&IntermediateChunk> =
            component.iter().map(|ix| &chunks[graph[*ix]]).collect();
        members.sort_by(|a, b| a.id.cmp(&b.id));
        ordered.extend(members);
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::syntax::print_expression;

    fn chunk(id: &str, requires: &[&str]) -> IntermediateChunk {
        IntermediateChunk {
            id: id.to_string(),
            requires: requires.iter().map(|r| r.to_string()).collect(),
            entries: Vec::new(),
            text: String::new(),
            hash: String::new(),
        }
    }

    #[test]
    fn parses_rendered_text() {
        let text = "// tessera intermediate chunk\n// source: /src/a.ts\n// requires: [\"/src/b.ts\"]\nconst all = {\n  \"/src/a.ts::a\": (all[\"/src/b.ts::b\"].x),\n  \"/src/a.ts::c\": ((x) => {\n    return x;\n  }),\n};\nexport const { models, slices, operations, fragments } = evaluate(all);\n";
        let parsed = parse_chunk(text).unwrap();
        assert_eq!(parsed.source, "/src/a.ts");
        assert_eq!(parsed.requires, vec!["/src/b.ts".to_string()]);
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.entries[0].0, "/src/a.ts::a");
        assert_eq!(print_expression(&parsed.entries[0].1), "all[\"/src/b.ts::b\"].x");
    }

    #[test]
    fn empty_table_parses() {
        let text = "// tessera intermediate chunk\n// source: /src/index.ts\n// requires: []\nconst all = {};\nexport const { models, slices, operations, fragments } = evaluate(all);\n";
        let parsed = parse_chunk(text).unwrap();
        assert!(parsed.entries.is_empty());
        assert!(parsed.requires.is_empty());
    }

    #[test]
    fn truncated_chunk_is_malformed() {
        let text = "// tessera intermediate chunk\n// source: /src/a.ts\n// requires: []\nconst all = {\n  \"/src/a.ts::a\": (1),\n";
        let err = parse_chunk(text).unwrap_err();
        assert_eq!(err.code(), "CHUNK_MALFORMED");
    }

    #[test]
    fn missing_export_line_is_malformed() {
        let text = "// source: /src/a.ts\nconst all = {};\n";
        assert!(matches!(
            parse_chunk(text),
            Err(CodegenError::MalformedChunk { .. })
        ));
    }

    #[test]
    fn required_chunks_load_first() {
        let chunks = vec![
            chunk("/src/query.ts", &["/src/user.ts", "/src/index.ts"]),
            chunk("/src/index.ts", &["/src/user.ts"]),
            chunk("/src/user.ts", &[]),
        ];
        let order: Vec<&str> = order_chunks(&chunks).iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, vec!["/src/user.ts", "/src/index.ts", "/src/query.ts"]);
    }

    #[test]
    fn mutually_requiring_chunks_stay_together() {
        let chunks = vec![
            chunk("/src/b.ts", &["/src/a.ts"]),
            chunk("/src/a.ts", &["/src/b.ts"]),
            chunk("/src/c.ts", &["/src/b.ts"]),
        ];
        let order: Vec<&str> = order_chunks(&chunks).iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, vec!["/src/a.ts", "/src/b.ts", "/src/c.ts"]);
    }
}
