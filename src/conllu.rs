//! CoNLL-U graph interchange
//!
//! Reads a parsed document serialized as CoNLL-U (one token per line,
//! sentences separated by blank lines) into a [`Graph`], and writes a graph
//! back out in the same format so parses can be stored and matched later.
//!
//! Multiword token ranges (`1-2`) and empty nodes (`2.1`) are skipped.
//! An entity type is read from the `NER=` key of the MISC column.
//!
//! CoNLL-U format: https://universaldependencies.org/format.html

use crate::graph::{Graph, GraphError, NodeId, Token, Vocab};
use atoi::FromRadix10Checked;
use memchr::memchr_iter;
use rustc_hash::FxHashMap;
use std::fmt::Write as _;
use thiserror::Error;

const N_FIELDS: usize = 10;
const NER_KEY: &str = "NER=";

/// Error during CoNLL-U parsing
#[derive(Debug, Error, PartialEq)]
#[error("Parse error at line {line_num}: {message}")]
pub struct ParseError {
    pub line_num: usize,
    pub message: String,
}

impl ParseError {
    fn new(line_num: usize, message: impl Into<String>) -> Self {
        Self {
            line_num,
            message: message.into(),
        }
    }
}

/// Token ID forms found in the first column
#[derive(Debug, Clone, Copy, PartialEq)]
enum TokenId {
    Single(usize),
    Range,
    Empty,
}

/// One token line, fields borrowed from the input
struct Line<'a> {
    line_num: usize,
    id: usize,
    head: usize,
    token: Token<'a>,
}

/// Parse a whole document (one or more sentences) into a graph
pub fn parse_graph(text: &str, vocab: &Vocab) -> Result<Graph, ParseError> {
    let mut graph = Graph::new(vocab.clone());
    let mut sentence: Vec<Line<'_>> = Vec::new();
    let mut texts: Vec<&str> = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_num = idx + 1;
        let line = raw.trim_end_matches('\r');

        if line.trim().is_empty() {
            flush_sentence(&mut graph, &mut sentence)?;
            continue;
        }

        if let Some(comment) = line.strip_prefix('#') {
            if let Some(sentence_text) = parse_text_comment(comment) {
                texts.push(sentence_text);
            }
            continue;
        }

        if let Some(parsed) = parse_line(line, line_num)? {
            sentence.push(parsed);
        }
    }
    flush_sentence(&mut graph, &mut sentence)?;

    if !texts.is_empty() {
        graph.text = Some(texts.join(" "));
    }

    graph
        .check_acyclic()
        .map_err(|e| ParseError::new(0, e.to_string()))?;

    Ok(graph)
}

/// Add one sentence's tokens to the graph and wire up heads
fn flush_sentence(graph: &mut Graph, lines: &mut Vec<Line<'_>>) -> Result<(), ParseError> {
    if lines.is_empty() {
        return Ok(());
    }

    graph.start_sentence();
    let mut by_id: FxHashMap<usize, NodeId> = FxHashMap::default();
    for line in lines.iter() {
        if by_id.contains_key(&line.id) {
            return Err(ParseError::new(
                line.line_num,
                format!("Duplicate token ID: {}", line.id),
            ));
        }
        let node_id = graph.add_token(line.token);
        by_id.insert(line.id, node_id);
    }

    for line in lines.iter() {
        if line.head == 0 {
            continue;
        }
        let child = by_id[&line.id];
        let head = *by_id.get(&line.head).ok_or_else(|| {
            ParseError::new(line.line_num, format!("HEAD {} not in sentence", line.head))
        })?;
        graph
            .set_head(child, head)
            .map_err(|e: GraphError| ParseError::new(line.line_num, e.to_string()))?;
    }

    lines.clear();
    Ok(())
}

/// Extract the value of a `# text = ...` comment
fn parse_text_comment(comment: &str) -> Option<&str> {
    let (key, value) = comment.split_once('=')?;
    if key.trim() == "text" {
        Some(value.trim())
    } else {
        None
    }
}

/// Parse a single token line; `None` for ranges and empty nodes
fn parse_line(line: &str, line_num: usize) -> Result<Option<Line<'_>>, ParseError> {
    let mut fields: [&str; N_FIELDS] = [""; N_FIELDS];
    let mut start = 0;
    let mut n = 0;
    for tab in memchr_iter(b'\t', line.as_bytes()) {
        if n == N_FIELDS - 1 {
            return Err(ParseError::new(line_num, "Expected 10 fields, found more"));
        }
        fields[n] = &line[start..tab];
        n += 1;
        start = tab + 1;
    }
    fields[n] = &line[start..];
    n += 1;

    if n != N_FIELDS {
        return Err(ParseError::new(
            line_num,
            format!("Expected 10 fields, found {}", n),
        ));
    }

    let id = match parse_id(fields[0]).ok_or_else(|| {
        ParseError::new(line_num, format!("Invalid ID: {}", fields[0]))
    })? {
        TokenId::Single(id) => id,
        TokenId::Range | TokenId::Empty => return Ok(None),
    };

    let head = if fields[6] == "_" {
        0
    } else {
        parse_index(fields[6])
            .ok_or_else(|| ParseError::new(line_num, format!("Invalid HEAD: {}", fields[6])))?
    };

    let form = fields[1];
    // Default to form if lemma not specified
    let lemma = if fields[2] == "_" { form } else { fields[2] };

    let ent_type = fields[9]
        .split('|')
        .find_map(|kv| kv.strip_prefix(NER_KEY))
        .filter(|v| !v.is_empty());

    Ok(Some(Line {
        line_num,
        id,
        head,
        token: Token {
            form,
            lemma,
            upos: fields[3],
            xpos: fields[4],
            feats: fields[5],
            deprel: fields[7],
            ent_type,
        },
    }))
}

/// Parse ID field (integer, range, or decimal)
fn parse_id(s: &str) -> Option<TokenId> {
    if s.contains('-') {
        Some(TokenId::Range)
    } else if s.contains('.') {
        Some(TokenId::Empty)
    } else {
        parse_index(s)
            .filter(|&id| id > 0)
            .map(TokenId::Single)
    }
}

/// Parse a whole field as an unsigned integer
#[inline]
fn parse_index(s: &str) -> Option<usize> {
    let (n, used) = usize::from_radix_10_checked(s.as_bytes());
    if used > 0 && used == s.len() { n } else { None }
}

/// Serialize a graph as CoNLL-U
///
/// Token IDs and heads are renumbered per sentence; a `# text` comment is
/// written before the first sentence when the graph carries text.
pub fn write_graph(graph: &Graph) -> String {
    let mut out = String::new();
    if let Some(text) = &graph.text {
        let _ = writeln!(out, "# text = {}", text);
    }

    let mut sentence_start = 0;
    for (idx, node) in graph.nodes.iter().enumerate() {
        if idx > 0 && node.sentence != graph.nodes[idx - 1].sentence {
            out.push('\n');
            sentence_start = idx;
        }
        let head = node.head.map_or(0, |h| h - sentence_start + 1);
        let misc = match node.ent_type {
            Some(ent) => format!("{}{}", NER_KEY, graph.resolve(ent)),
            None => "_".to_string(),
        };
        let _ = writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t_\t{}",
            idx - sentence_start + 1,
            graph.resolve(node.form),
            graph.resolve(node.lemma),
            graph.resolve(node.upos),
            graph.resolve(node.xpos),
            graph.resolve(node.feats),
            head,
            graph.resolve(node.deprel),
            misc,
        );
    }
    if !graph.is_empty() {
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = "# text = The dog runs.
1\tThe\tthe\tDET\tDT\t_\t2\tdet\t_\t_
2\tdog\tdog\tNOUN\tNN\tNumber=Sing\t3\tnsubj\t_\tNER=ANIMAL
3\truns\trun\tVERB\tVBZ\tNumber=Sing|Tense=Pres\t0\troot\t_\tSpaceAfter=No
4\t.\t.\tPUNCT\t.\t_\t3\tpunct\t_\t_

";

    #[test]
    fn test_parse_simple_sentence() {
        let graph = parse_graph(SIMPLE, &Vocab::new()).unwrap();

        assert_eq!(graph.len(), 4);
        assert_eq!(graph.text.as_deref(), Some("The dog runs."));
        assert_eq!(graph.roots().collect::<Vec<_>>(), vec![2]);
        assert_eq!(graph.lemma(2), Some("run"));
        assert_eq!(graph.deprel(1), Some("nsubj"));
        assert_eq!(graph.children(2), &[1, 3]);
        assert_eq!(graph.resolve(graph.nodes[2].feats), "Number=Sing|Tense=Pres");
        assert_eq!(
            graph.nodes[1].ent_type.map(|e| graph.resolve(e)),
            Some("ANIMAL")
        );
        assert_eq!(graph.nodes[2].ent_type, None);
    }

    #[test]
    fn test_multiple_sentences_offset_heads() {
        let text = "1\tCats\tcat\tNOUN\tNNS\t_\t2\tnsubj\t_\t_
2\tsleep\tsleep\tVERB\tVBP\t_\t0\troot\t_\t_

1\tDogs\tdog\tNOUN\tNNS\t_\t2\tnsubj\t_\t_
2\tbark\tbark\tVERB\tVBP\t_\t0\troot\t_\t_
";
        let graph = parse_graph(text, &Vocab::new()).unwrap();

        assert_eq!(graph.len(), 4);
        assert_eq!(graph.sentence_count(), 2);
        assert_eq!(graph.head(2), Some(3));
        assert_eq!(graph.roots().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_skips_ranges_and_empty_nodes() {
        let text = "1-2\tdu\t_\t_\t_\t_\t_\t_\t_\t_
1\tde\tde\tADP\t_\t_\t3\tcase\t_\t_
2\tle\tle\tDET\t_\t_\t3\tdet\t_\t_
2.1\tx\tx\tX\t_\t_\t_\t_\t_\t_
3\tchat\tchat\tNOUN\t_\t_\t0\troot\t_\t_
";
        let graph = parse_graph(text, &Vocab::new()).unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.children(2), &[0, 1]);
    }

    #[test]
    fn test_missing_lemma_defaults_to_form() {
        let text = "1\tChatGPT\t_\tPROPN\t_\t_\t0\troot\t_\t_\n";
        let graph = parse_graph(text, &Vocab::new()).unwrap();
        assert_eq!(graph.lemma(0), Some("ChatGPT"));
    }

    #[test]
    fn test_parse_errors() {
        let vocab = Vocab::new();

        let err = parse_graph("1\tdog\tdog\tNOUN\n", &vocab).unwrap_err();
        assert_eq!(err.line_num, 1);
        assert!(err.message.contains("Expected 10 fields"));

        let err = parse_graph("1\tdog\tdog\tNOUN\t_\t_\tx\troot\t_\t_\n", &vocab).unwrap_err();
        assert!(err.message.contains("Invalid HEAD"));

        let err = parse_graph("1\tdog\tdog\tNOUN\t_\t_\t5\troot\t_\t_\n", &vocab).unwrap_err();
        assert!(err.message.contains("not in sentence"));

        let cyclic = "1\ta\ta\tX\t_\t_\t2\tdep\t_\t_\n2\tb\tb\tX\t_\t_\t1\tdep\t_\t_\n";
        assert!(parse_graph(cyclic, &vocab).is_err());
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("1"), Some(TokenId::Single(1)));
        assert_eq!(parse_id("42"), Some(TokenId::Single(42)));
        assert_eq!(parse_id("1-2"), Some(TokenId::Range));
        assert_eq!(parse_id("2.1"), Some(TokenId::Empty));
        assert_eq!(parse_id("0"), None);
        assert_eq!(parse_id("x"), None);
    }

    #[test]
    fn test_write_then_read_preserves_structure() {
        let vocab = Vocab::new();
        let two = format!(
            "{}1\tCats\tcat\tNOUN\tNNS\t_\t2\tnsubj\t_\t_\n2\tsleep\tsleep\tVERB\tVBP\t_\t0\troot\t_\t_\n",
            SIMPLE
        );
        let graph = parse_graph(&two, &vocab).unwrap();
        let written = write_graph(&graph);
        let reread = parse_graph(&written, &vocab).unwrap();

        assert_eq!(reread.len(), graph.len());
        assert_eq!(reread.sentence_count(), 2);
        assert_eq!(reread.text, graph.text);
        for (a, b) in graph.nodes.iter().zip(&reread.nodes) {
            assert_eq!(a.head, b.head);
            assert_eq!(a.lemma, b.lemma);
            assert_eq!(a.deprel, b.deprel);
            assert_eq!(a.ent_type, b.ent_type);
        }
    }
}
