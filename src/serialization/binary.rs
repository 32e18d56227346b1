//! Flat binary dump of a [`WordGraph`].
//!
//! ```text
//! Graph     := node_count:i32, Node{node_count}
//! Node      := Token, visit_count:i32, FrecTable(incoming), FrecTable(outgoing)
//! FrecTable := entry_count:i32, total_count:i32, Entry{entry_count}
//! Entry     := count:i32, Token
//! Token     := category:i8, text_length:i32, text_bytes[text_length]
//! ```
//!
//! Every integer is little-endian with the width shown, independent of the host. Entries
//! are written in rank order so a reader can append them without re-sorting.

use std::io::{self, Read, Write};

use crate::error::{Result, WeaveError};
use crate::frec::{Count, FrecTable};
use crate::graph::{NodeId, WordGraph};
use crate::token::{Category, Token};

/// Upper bound on speculative allocations driven by length fields.
const PREALLOC_LIMIT: usize = 4096;

/// Writes `graph` to `sink`.
pub fn write_graph<W: Write + ?Sized>(graph: &WordGraph, sink: &mut W) -> Result<()> {
    write_len(sink, graph.len())?;
    for (_, node) in graph.nodes() {
        write_token(sink, node.token())?;
        write_i32(sink, count_to_i32(u64::from(node.count()))?)?;
        write_table(sink, graph, node.incoming())?;
        write_table(sink, graph, node.outgoing())?;
    }
    Ok(())
}

/// Reads a graph written by [`write_graph`], validating its structure.
pub fn read_graph<R: Read + ?Sized>(source: &mut R) -> Result<WordGraph> {
    let node_count = read_len(source, "node count")?;
    let mut raw_nodes = Vec::with_capacity(node_count.min(PREALLOC_LIMIT));
    for _ in 0..node_count {
        let token = read_token(source)?;
        let count = read_count(source, "visit count")?;
        let incoming = read_table(source)?;
        let outgoing = read_table(source)?;
        raw_nodes.push(RawNode {
            token,
            count,
            incoming,
            outgoing,
        });
    }

    let mut graph = WordGraph::new();
    let mut ids = Vec::with_capacity(raw_nodes.len());
    for raw in &raw_nodes {
        ids.push(graph.insert_restored(raw.token.clone(), raw.count)?);
    }
    for (raw, id) in raw_nodes.into_iter().zip(ids) {
        let incoming = resolve(&graph, raw.incoming)?;
        let outgoing = resolve(&graph, raw.outgoing)?;
        let node = graph.node_mut(id);
        restore_table(node.incoming_mut(), incoming)?;
        restore_table(node.outgoing_mut(), outgoing)?;
    }
    graph.check_links()?;
    Ok(graph)
}

struct RawNode {
    token: Token,
    count: Count,
    incoming: Vec<(Count, Token)>,
    outgoing: Vec<(Count, Token)>,
}

fn resolve(graph: &WordGraph, entries: Vec<(Count, Token)>) -> Result<Vec<(Count, NodeId)>> {
    entries
        .into_iter()
        .map(|(count, token)| {
            graph
                .id_of(&token)
                .map(|id| (count, id))
                .ok_or_else(|| WeaveError::Corrupt(format!("link to undeclared token {token}")))
        })
        .collect()
}

fn restore_table(table: &mut FrecTable<NodeId>, entries: Vec<(Count, NodeId)>) -> Result<()> {
    for (count, id) in entries {
        table.push_sorted(count, id)?;
    }
    Ok(())
}

fn write_table<W: Write + ?Sized>(
    sink: &mut W,
    graph: &WordGraph,
    table: &FrecTable<NodeId>,
) -> Result<()> {
    write_len(sink, table.len())?;
    write_i32(sink, count_to_i32(table.total())?)?;
    for (count, id) in table.iter() {
        let target = graph
            .get(id)
            .ok_or_else(|| WeaveError::Internal(format!("dangling node handle {id}")))?;
        write_i32(sink, count_to_i32(u64::from(count))?)?;
        write_token(sink, target.token())?;
    }
    Ok(())
}

fn read_table<R: Read + ?Sized>(source: &mut R) -> Result<Vec<(Count, Token)>> {
    let entry_count = read_len(source, "entry count")?;
    let declared_total = u64::from(read_count(source, "total count")?);
    let mut entries = Vec::with_capacity(entry_count.min(PREALLOC_LIMIT));
    let mut total = 0u64;
    for _ in 0..entry_count {
        let count = read_count(source, "link count")?;
        total += u64::from(count);
        entries.push((count, read_token(source)?));
    }
    if total != declared_total {
        return Err(WeaveError::Corrupt(format!(
            "table declares total {declared_total} but entries sum to {total}"
        )));
    }
    Ok(entries)
}

fn write_token<W: Write + ?Sized>(sink: &mut W, token: &Token) -> Result<()> {
    write_all(sink, &token.category().code().to_le_bytes())?;
    write_len(sink, token.text().len())?;
    write_all(sink, token.text().as_bytes())
}

fn read_token<R: Read + ?Sized>(source: &mut R) -> Result<Token> {
    let mut code = [0u8; 1];
    read_exact(source, &mut code)?;
    let code = i8::from_le_bytes(code);
    let category = Category::from_code(code)
        .ok_or_else(|| WeaveError::Corrupt(format!("unknown token category {code}")))?;
    let len = read_len(source, "text length")?;
    let mut text = Vec::with_capacity(len.min(PREALLOC_LIMIT));
    let read = Read::take(&mut *source, len as u64)
        .read_to_end(&mut text)
        .map_err(|err| WeaveError::io(err, None))?;
    if read != len {
        return Err(truncated());
    }
    let text = String::from_utf8(text)
        .map_err(|_| WeaveError::Corrupt("token text is not valid UTF-8".into()))?;
    if category.is_sentinel() && !text.is_empty() {
        return Err(WeaveError::Corrupt(format!(
            "{category:?} sentinel carries text"
        )));
    }
    Ok(Token::new(category, text))
}

fn count_to_i32(value: u64) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| WeaveError::Serialization(format!("count {value} exceeds the i32 range")))
}

fn write_len<W: Write + ?Sized>(sink: &mut W, len: usize) -> Result<()> {
    let value = i32::try_from(len)
        .map_err(|_| WeaveError::Serialization(format!("length {len} exceeds the i32 range")))?;
    write_i32(sink, value)
}

fn read_len<R: Read + ?Sized>(source: &mut R, what: &str) -> Result<usize> {
    let value = read_i32(source)?;
    usize::try_from(value).map_err(|_| WeaveError::Corrupt(format!("negative {what} {value}")))
}

fn read_count<R: Read + ?Sized>(source: &mut R, what: &str) -> Result<Count> {
    let value = read_i32(source)?;
    Count::try_from(value).map_err(|_| WeaveError::Corrupt(format!("negative {what} {value}")))
}

fn write_i32<W: Write + ?Sized>(sink: &mut W, value: i32) -> Result<()> {
    write_all(sink, &value.to_le_bytes())
}

fn read_i32<R: Read + ?Sized>(source: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    read_exact(source, &mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn write_all<W: Write + ?Sized>(sink: &mut W, bytes: &[u8]) -> Result<()> {
    sink.write_all(bytes).map_err(|err| WeaveError::io(err, None))
}

fn read_exact<R: Read + ?Sized>(source: &mut R, buf: &mut [u8]) -> Result<()> {
    source.read_exact(buf).map_err(|err| {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            truncated()
        } else {
            WeaveError::io(err, None)
        }
    })
}

fn truncated() -> WeaveError {
    WeaveError::Corrupt("unexpected end of model data".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> WordGraph {
        let mut graph = WordGraph::new();
        let lines: [&[Token]; 2] = [
            &[
                Token::start(),
                Token::word("hola"),
                Token::new(Category::RightStop, "!"),
                Token::end(),
            ],
            &[Token::start(), Token::word("hola"), Token::end()],
        ];
        for line in lines {
            let mut prev: Option<&Token> = None;
            for token in line {
                graph.add_word(token);
                if let Some(prev) = prev {
                    graph.add_link(prev, token).expect("nodes exist");
                }
                prev = Some(token);
            }
        }
        graph
    }

    fn encode(graph: &WordGraph) -> Vec<u8> {
        let mut bytes = Vec::new();
        write_graph(graph, &mut bytes).expect("write");
        bytes
    }

    #[test]
    fn restores_counts_and_links() {
        let graph = sample_graph();
        let restored = read_graph(&mut encode(&graph).as_slice()).expect("read");
        assert_eq!(restored.len(), graph.len());
        for (_, node) in graph.nodes() {
            let other = restored.node(node.token()).expect("node restored");
            assert_eq!(other.count(), node.count());
        }
        let mut before: Vec<_> = graph.links().collect();
        let mut after: Vec<_> = restored.links().collect();
        before.sort();
        after.sort();
        assert_eq!(before, after);
    }

    #[test]
    fn header_is_little_endian_node_count() {
        let bytes = encode(&sample_graph());
        assert_eq!(&bytes[..4], &4i32.to_le_bytes());
        // First node is START: category 0, empty text.
        assert_eq!(bytes[4], 0);
        assert_eq!(&bytes[5..9], &0i32.to_le_bytes());
    }

    #[test]
    fn empty_graph_is_four_zero_bytes() {
        let bytes = encode(&WordGraph::new());
        assert_eq!(bytes, vec![0, 0, 0, 0]);
        let restored = read_graph(&mut bytes.as_slice()).expect("read empty");
        assert!(restored.is_empty());
    }

    #[test]
    fn truncated_input_is_corrupt() {
        let bytes = encode(&sample_graph());
        for cut in [2, 9, bytes.len() / 2, bytes.len() - 1] {
            let err = read_graph(&mut &bytes[..cut]).expect_err("truncated");
            assert!(err.is_corrupt(), "cut at {cut}: {err}");
        }
    }

    #[test]
    fn negative_and_unknown_fields_are_corrupt() {
        let negative = (-1i32).to_le_bytes();
        let err = read_graph(&mut negative.as_slice()).expect_err("negative count");
        assert!(matches!(err, WeaveError::Corrupt(_)));

        let mut bytes = 1i32.to_le_bytes().to_vec();
        bytes.push(42);
        let err = read_graph(&mut bytes.as_slice()).expect_err("bad category");
        assert!(matches!(err, WeaveError::Corrupt(message) if message.contains("category")));
    }

    #[test]
    fn link_to_undeclared_token_is_corrupt() {
        let mut bytes = Vec::new();
        write_i32(&mut bytes, 1).expect("node count");
        write_token(&mut bytes, &Token::word("a")).expect("token");
        write_i32(&mut bytes, 1).expect("visit count");
        // incoming: empty
        write_i32(&mut bytes, 0).expect("entries");
        write_i32(&mut bytes, 0).expect("total");
        // outgoing: one link to a token that is never declared
        write_i32(&mut bytes, 1).expect("entries");
        write_i32(&mut bytes, 1).expect("total");
        write_i32(&mut bytes, 1).expect("count");
        write_token(&mut bytes, &Token::word("ghost")).expect("token");
        let err = read_graph(&mut bytes.as_slice()).expect_err("undeclared");
        assert!(matches!(err, WeaveError::Corrupt(message) if message.contains("ghost")));
    }

    #[test]
    fn mismatched_total_is_corrupt() {
        let mut bytes = Vec::new();
        write_i32(&mut bytes, 1).expect("node count");
        write_token(&mut bytes, &Token::word("a")).expect("token");
        write_i32(&mut bytes, 1).expect("visit count");
        write_i32(&mut bytes, 0).expect("entries");
        write_i32(&mut bytes, 5).expect("total");
        let err = read_graph(&mut bytes.as_slice()).expect_err("bad total");
        assert!(matches!(err, WeaveError::Corrupt(message) if message.contains("total")));
    }

    fn empty_table(bytes: &mut Vec<u8>) {
        write_i32(bytes, 0).expect("entries");
        write_i32(bytes, 0).expect("total");
    }

    fn single_entry_table(bytes: &mut Vec<u8>, target: &Token) {
        write_i32(bytes, 1).expect("entries");
        write_i32(bytes, 1).expect("total");
        write_i32(bytes, 1).expect("count");
        write_token(bytes, target).expect("token");
    }

    fn corrupt_message(bytes: &[u8]) -> String {
        match read_graph(&mut &bytes[..]) {
            Err(WeaveError::Corrupt(message)) => message,
            other => panic!("expected corrupt data, got {other:?}"),
        }
    }

    #[test]
    fn one_sided_link_is_corrupt() {
        let (a, b) = (Token::word("a"), Token::word("b"));
        let mut bytes = Vec::new();
        write_i32(&mut bytes, 2).expect("node count");
        write_token(&mut bytes, &a).expect("token");
        write_i32(&mut bytes, 1).expect("visit count");
        empty_table(&mut bytes);
        single_entry_table(&mut bytes, &b);
        // b never records a as a predecessor.
        write_token(&mut bytes, &b).expect("token");
        write_i32(&mut bytes, 1).expect("visit count");
        empty_table(&mut bytes);
        empty_table(&mut bytes);
        let message = corrupt_message(&bytes);
        assert_eq!(message, "link a -> b counted 1 forward but 0 backward");
    }

    #[test]
    fn predecessor_without_matching_successor_is_corrupt() {
        let (a, b) = (Token::word("a"), Token::word("b"));
        let mut bytes = Vec::new();
        write_i32(&mut bytes, 2).expect("node count");
        write_token(&mut bytes, &a).expect("token");
        write_i32(&mut bytes, 1).expect("visit count");
        empty_table(&mut bytes);
        empty_table(&mut bytes);
        write_token(&mut bytes, &b).expect("token");
        write_i32(&mut bytes, 1).expect("visit count");
        single_entry_table(&mut bytes, &a);
        empty_table(&mut bytes);
        let message = corrupt_message(&bytes);
        assert!(message.starts_with("link into b"), "{message}");
    }

    #[test]
    fn duplicate_node_is_corrupt() {
        let a = Token::word("a");
        let mut bytes = Vec::new();
        write_i32(&mut bytes, 2).expect("node count");
        for _ in 0..2 {
            write_token(&mut bytes, &a).expect("token");
            write_i32(&mut bytes, 1).expect("visit count");
            empty_table(&mut bytes);
            empty_table(&mut bytes);
        }
        assert_eq!(corrupt_message(&bytes), "node a declared twice");
    }

    #[test]
    fn zero_visit_count_is_corrupt() {
        let mut bytes = Vec::new();
        write_i32(&mut bytes, 1).expect("node count");
        write_token(&mut bytes, &Token::word("a")).expect("token");
        write_i32(&mut bytes, 0).expect("visit count");
        empty_table(&mut bytes);
        empty_table(&mut bytes);
        assert_eq!(corrupt_message(&bytes), "node a has a zero count");
    }

    #[test]
    fn sentinel_with_text_is_corrupt() {
        let mut bytes = Vec::new();
        write_i32(&mut bytes, 1).expect("node count");
        bytes.push(Category::Start.code().to_le_bytes()[0]);
        write_i32(&mut bytes, 2).expect("text length");
        bytes.extend_from_slice(b"hi");
        assert!(corrupt_message(&bytes).contains("sentinel carries text"));
    }

    #[test]
    fn invalid_utf8_text_is_corrupt() {
        let mut bytes = Vec::new();
        write_i32(&mut bytes, 1).expect("node count");
        bytes.push(Category::Word.code().to_le_bytes()[0]);
        write_i32(&mut bytes, 2).expect("text length");
        bytes.extend_from_slice(&[0xC3, 0x28]);
        assert_eq!(corrupt_message(&bytes), "token text is not valid UTF-8");
    }

    #[test]
    fn zero_link_count_is_corrupt() {
        let (a, b) = (Token::word("a"), Token::word("b"));
        let mut bytes = Vec::new();
        write_i32(&mut bytes, 2).expect("node count");
        write_token(&mut bytes, &a).expect("token");
        write_i32(&mut bytes, 1).expect("visit count");
        empty_table(&mut bytes);
        write_i32(&mut bytes, 1).expect("entries");
        write_i32(&mut bytes, 0).expect("total");
        write_i32(&mut bytes, 0).expect("count");
        write_token(&mut bytes, &b).expect("token");
        write_token(&mut bytes, &b).expect("token");
        write_i32(&mut bytes, 1).expect("visit count");
        empty_table(&mut bytes);
        empty_table(&mut bytes);
        assert_eq!(corrupt_message(&bytes), "link count of zero");
    }
}
