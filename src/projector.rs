//! Match projection
//!
//! Turns a tagged catalog match into a fixed-shape relation record. The
//! record shape is chosen by the family that produced the match; the node
//! count is checked against the family's arity so a malformed match is
//! reported instead of being read out of the wrong slots.

use crate::compiler::{Catalog, FamilyKind};
use crate::graph::{Graph, Node, NodeId};
use crate::matcher::CatalogMatch;
use crate::profile::LanguageProfile;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ProjectionError {
    #[error("{family} match binds {found} nodes, expected {expected}")]
    Arity {
        family: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("matched node {0} is not in the graph")]
    MissingNode(NodeId),

    #[error("{family} has no variant {variant}")]
    UnknownVariant { family: &'static str, variant: usize },
}

/// Output columns of a relation record, in order
pub const RECORD_COLUMNS: [&str; 22] = [
    "pattern",
    "variant",
    "target_lemma",
    "target_index",
    "modifier_lemma",
    "modifier_pos",
    "modifier_deprel",
    "modifier_index",
    "subject_lemma",
    "subject_amod",
    "subject_appos",
    "subject_index",
    "verb_lemma",
    "verb_morph",
    "verb_index",
    "verb_negation",
    "object_lemma",
    "object_amod",
    "object_appos",
    "object_index",
    "subject_form",
    "object_form",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetModifier {
    pub target_lemma: String,
    pub target_index: NodeId,
    pub modifier_lemma: String,
    pub modifier_pos: String,
    pub modifier_deprel: String,
    pub modifier_index: NodeId,
}

/// Subject or object slot of an SOV record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub lemma: String,
    pub form: String,
    /// Pipe-joined lemmas of adjectival modifier children
    pub amod: Option<String>,
    /// Pipe-joined lemmas of appositional modifier children
    pub appos: Option<String>,
    pub index: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verb {
    pub lemma: String,
    pub morph: Option<String>,
    pub index: NodeId,
    pub negation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sov {
    pub subject: Argument,
    pub verb: Verb,
    pub object: Argument,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    TargetModifier(TargetModifier),
    Sov(Sov),
}

/// One projected match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationRecord {
    pub family: FamilyKind,
    pub variant: String,
    pub relation: Relation,
}

impl RelationRecord {
    pub fn sov(&self) -> Option<&Sov> {
        match &self.relation {
            Relation::Sov(sov) => Some(sov),
            Relation::TargetModifier(_) => None,
        }
    }

    pub fn target_modifier(&self) -> Option<&TargetModifier> {
        match &self.relation {
            Relation::TargetModifier(pair) => Some(pair),
            Relation::Sov(_) => None,
        }
    }

    /// Cells aligned with [`RECORD_COLUMNS`]; unpopulated fields are `None`
    pub fn to_row(&self) -> Vec<Option<String>> {
        let mut row: Vec<Option<String>> = vec![None; RECORD_COLUMNS.len()];
        row[0] = Some(self.family.name().to_string());
        row[1] = Some(self.variant.clone());

        match &self.relation {
            Relation::TargetModifier(pair) => {
                row[2] = Some(pair.target_lemma.clone());
                row[3] = Some(pair.target_index.to_string());
                row[4] = Some(pair.modifier_lemma.clone());
                row[5] = Some(pair.modifier_pos.clone());
                row[6] = Some(pair.modifier_deprel.clone());
                row[7] = Some(pair.modifier_index.to_string());
            }
            Relation::Sov(sov) => {
                row[8] = Some(sov.subject.lemma.clone());
                row[9] = sov.subject.amod.clone();
                row[10] = sov.subject.appos.clone();
                row[11] = Some(sov.subject.index.to_string());
                row[12] = Some(sov.verb.lemma.clone());
                row[13] = sov.verb.morph.clone();
                row[14] = Some(sov.verb.index.to_string());
                row[15] = sov.verb.negation.clone();
                row[16] = Some(sov.object.lemma.clone());
                row[17] = sov.object.amod.clone();
                row[18] = sov.object.appos.clone();
                row[19] = Some(sov.object.index.to_string());
                row[20] = Some(sov.subject.form.clone());
                row[21] = Some(sov.object.form.clone());
            }
        }

        row
    }
}

/// Projects catalog matches over one language profile
#[derive(Debug, Clone)]
pub struct Projector<'a> {
    catalog: &'a Catalog,
    profile: &'a LanguageProfile,
}

impl<'a> Projector<'a> {
    pub fn new(catalog: &'a Catalog, profile: &'a LanguageProfile) -> Self {
        Self { catalog, profile }
    }

    pub fn project(
        &self,
        graph: &Graph,
        m: &CatalogMatch,
    ) -> Result<RelationRecord, ProjectionError> {
        let expected = m.kind.arity();
        if m.nodes.len() != expected {
            return Err(ProjectionError::Arity {
                family: m.kind.name(),
                expected,
                found: m.nodes.len(),
            });
        }

        let variant = self
            .catalog
            .family(m.kind)
            .and_then(|family| family.variants.get(m.variant))
            .ok_or(ProjectionError::UnknownVariant {
                family: m.kind.name(),
                variant: m.variant,
            })?
            .name
            .clone();

        let relation = match m.kind {
            FamilyKind::TargetModifier => {
                let target = node(graph, m.nodes[0])?;
                let modifier = node(graph, m.nodes[1])?;
                Relation::TargetModifier(TargetModifier {
                    target_lemma: graph.resolve(target.lemma).to_string(),
                    target_index: target.id,
                    modifier_lemma: graph.resolve(modifier.lemma).to_string(),
                    modifier_pos: graph.resolve(modifier.upos).to_string(),
                    modifier_deprel: graph.resolve(modifier.deprel).to_string(),
                    modifier_index: modifier.id,
                })
            }
            FamilyKind::Sov | FamilyKind::NegatedSov => {
                let verb = node(graph, m.nodes[0])?;
                let negation = match m.kind {
                    FamilyKind::NegatedSov => {
                        Some(graph.resolve(node(graph, m.nodes[3])?.lemma).to_string())
                    }
                    _ => None,
                };
                let morph = graph.resolve(verb.feats);
                Relation::Sov(Sov {
                    subject: self.argument(graph, m.nodes[1])?,
                    verb: Verb {
                        lemma: graph.resolve(verb.lemma).to_string(),
                        morph: (morph != "_" && !morph.is_empty()).then(|| morph.to_string()),
                        index: verb.id,
                        negation,
                    },
                    object: self.argument(graph, m.nodes[2])?,
                })
            }
        };

        Ok(RelationRecord {
            family: m.kind,
            variant,
            relation,
        })
    }

    fn argument(&self, graph: &Graph, id: NodeId) -> Result<Argument, ProjectionError> {
        let arg = node(graph, id)?;
        Ok(Argument {
            lemma: graph.resolve(arg.lemma).to_string(),
            form: graph.resolve(arg.form).to_string(),
            amod: modifiers(graph, id, &self.profile.adjectival_fragment),
            appos: modifiers(graph, id, &self.profile.appositional_fragment),
            index: id,
        })
    }
}

fn node(graph: &Graph, id: NodeId) -> Result<&Node, ProjectionError> {
    graph.node(id).ok_or(ProjectionError::MissingNode(id))
}

/// Lemmas of direct children whose label contains `fragment`, pipe-joined
/// in child order
fn modifiers(graph: &Graph, id: NodeId, fragment: &str) -> Option<String> {
    let lemmas: Vec<&str> = graph
        .children(id)
        .iter()
        .filter_map(|&child| graph.node(child))
        .filter(|child| graph.resolve(child.deprel).contains(fragment))
        .map(|child| graph.resolve(child.lemma))
        .collect();

    (!lemmas.is_empty()).then(|| lemmas.join("|"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_catalog;
    use crate::conllu::parse_graph;
    use crate::graph::Vocab;
    use crate::matcher::Matcher;

    const BIG_CAT: &str = "1\tThe\tthe\tDET\t_\t_\t3\tdet\t_\t_
2\tbig\tbig\tADJ\t_\t_\t3\tamod\t_\t_
3\tcat\tcat\tNOUN\t_\t_\t7\tnsubj\t_\t_
4\t,\t,\tPUNCT\t_\t_\t5\tpunct\t_\t_
5\tTom\tTom\tPROPN\t_\t_\t3\tappos\t_\t_
6\tnot\tnot\tPART\t_\t_\t7\tneg\t_\t_
7\teats\teat\tVERB\t_\tMood=Ind|Tense=Pres\t0\troot\t_\t_
8\tgrey\tgrey\tADJ\t_\t_\t10\tamod\t_\t_
9\tsmall\tsmall\tADJ\t_\t_\t10\tamod\t_\t_
10\tmice\tmouse\tNOUN\t_\t_\t7\tobj\t_\t_
";

    fn records(text: &str, target: Option<&str>, negation: bool) -> Vec<RelationRecord> {
        let graph = parse_graph(text, &Vocab::new()).unwrap();
        let profile = LanguageProfile::english();
        let catalog = compile_catalog(&profile, target, negation).unwrap();
        let projector = Projector::new(&catalog, &profile);
        Matcher::new(&graph)
            .find_catalog(&catalog)
            .iter()
            .map(|m| projector.project(&graph, m).unwrap())
            .collect()
    }

    #[test]
    fn test_sov_record_collects_modifiers() {
        let records = records(BIG_CAT, None, false);
        assert_eq!(records.len(), 1);
        let sov = records[0].sov().unwrap();

        assert_eq!(sov.subject.lemma, "cat");
        assert_eq!(sov.subject.amod.as_deref(), Some("big"));
        assert_eq!(sov.subject.appos.as_deref(), Some("Tom"));
        assert_eq!(sov.object.lemma, "mouse");
        assert_eq!(sov.object.form, "mice");
        // Child order, not sorted
        assert_eq!(sov.object.amod.as_deref(), Some("grey|small"));
        assert_eq!(sov.object.appos, None);
        assert_eq!(sov.verb.lemma, "eat");
        assert_eq!(sov.verb.morph.as_deref(), Some("Mood=Ind|Tense=Pres"));
        assert_eq!(sov.verb.negation, None);
    }

    #[test]
    fn test_negated_record_carries_negation_lemma() {
        let records = records(BIG_CAT, None, true);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].family, FamilyKind::NegatedSov);
        assert_eq!(records[0].variant, "negated_sov");
        assert_eq!(records[0].sov().unwrap().verb.negation.as_deref(), Some("not"));
    }

    #[test]
    fn test_target_modifier_record() {
        let records = records(BIG_CAT, Some("cat"), false);
        let pairs: Vec<_> = records.iter().filter_map(|r| r.target_modifier()).collect();

        // big (amod) and Tom (appos); the punctuation and determiner are not modifiers
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].target_lemma, "cat");
        assert_eq!(pairs[0].modifier_lemma, "big");
        assert_eq!(pairs[0].modifier_pos, "ADJ");
        assert_eq!(pairs[1].modifier_deprel, "appos");
        assert_eq!(pairs[1].modifier_index, 4);
    }

    #[test]
    fn test_row_shape_is_fixed() {
        for record in records(BIG_CAT, Some("cat"), true) {
            let row = record.to_row();
            assert_eq!(row.len(), RECORD_COLUMNS.len());
            assert_eq!(row[0].as_deref(), Some(record.family.name()));
            match record.family {
                FamilyKind::TargetModifier => {
                    assert!(row[2].is_some());
                    assert!(row[12].is_none());
                }
                _ => {
                    assert!(row[2].is_none());
                    assert!(row[12].is_some());
                }
            }
        }
    }

    #[test]
    fn test_arity_mismatch_is_an_error() {
        let graph = parse_graph(BIG_CAT, &Vocab::new()).unwrap();
        let profile = LanguageProfile::english();
        let catalog = compile_catalog(&profile, None, false).unwrap();
        let projector = Projector::new(&catalog, &profile);

        let bad = CatalogMatch {
            kind: FamilyKind::Sov,
            variant: 0,
            nodes: vec![6, 2],
        };
        assert_eq!(
            projector.project(&graph, &bad),
            Err(ProjectionError::Arity {
                family: "sov",
                expected: 3,
                found: 2
            })
        );

        let dangling = CatalogMatch {
            kind: FamilyKind::Sov,
            variant: 0,
            nodes: vec![6, 2, 42],
        };
        assert_eq!(
            projector.project(&graph, &dangling),
            Err(ProjectionError::MissingNode(42))
        );
    }
}
