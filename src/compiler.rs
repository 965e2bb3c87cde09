//! Pattern catalog compilation
//!
//! Builds the fixed set of pattern families the extractor knows about from
//! a language profile, an optional target lemma and a negation flag:
//!
//! - `sov`: a verb with a subject child and an object child
//! - `negated_sov`: the same plus a negation-marker child of the verb
//! - `target_modifier`: a node with the target lemma and a modifier
//!   somewhere below it
//!
//! With a target, each SOV family gets two variants, one requiring the
//! target lemma on the subject and one on the object.

use crate::pattern::{Pattern, PatternError, Predicate, RelOp};
use crate::profile::LanguageProfile;

pub const VERB: &str = "verb";
pub const SUBJECT: &str = "subject";
pub const OBJECT: &str = "object";
pub const NEGATION: &str = "negation";
pub const TARGET: &str = "target";
pub const MODIFIER: &str = "modifier";

/// The closed set of pattern shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FamilyKind {
    Sov,
    NegatedSov,
    TargetModifier,
}

impl FamilyKind {
    pub fn name(self) -> &'static str {
        match self {
            FamilyKind::Sov => "sov",
            FamilyKind::NegatedSov => "negated_sov",
            FamilyKind::TargetModifier => "target_modifier",
        }
    }

    /// Number of nodes bound by every match of this family
    pub fn arity(self) -> usize {
        match self {
            FamilyKind::Sov => 3,
            FamilyKind::NegatedSov => 4,
            FamilyKind::TargetModifier => 2,
        }
    }
}

/// Which slot, if any, a variant pins to the target lemma
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSlot {
    None,
    Subject,
    Object,
    Anchor,
}

#[derive(Debug, Clone)]
pub struct Variant {
    pub name: String,
    pub target_slot: TargetSlot,
    pub pattern: Pattern,
}

#[derive(Debug, Clone)]
pub struct Family {
    pub kind: FamilyKind,
    pub variants: Vec<Variant>,
}

impl Family {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Compiled pattern families, immutable once built
#[derive(Debug, Clone)]
pub struct Catalog {
    families: Vec<Family>,
    target: Option<String>,
}

impl Catalog {
    pub fn families(&self) -> &[Family] {
        &self.families
    }

    pub fn family(&self, kind: FamilyKind) -> Option<&Family> {
        self.families.iter().find(|f| f.kind == kind)
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn pattern_count(&self) -> usize {
        self.families.iter().map(|f| f.variants.len()).sum()
    }
}

/// Build the catalog for a profile, optional target lemma and negation flag
///
/// A blank target is treated as no target.
pub fn compile_catalog(
    profile: &LanguageProfile,
    target: Option<&str>,
    negation: bool,
) -> Result<Catalog, PatternError> {
    let target = target.map(str::trim).filter(|t| !t.is_empty());
    let mut families = vec![sov_family(profile, target, false)?];

    if negation {
        families.push(sov_family(profile, target, true)?);
    }

    if let Some(target) = target {
        families.push(Family {
            kind: FamilyKind::TargetModifier,
            variants: vec![Variant {
                name: FamilyKind::TargetModifier.name().to_string(),
                target_slot: TargetSlot::Anchor,
                pattern: target_modifier_pattern(profile, target)?,
            }],
        });
    }

    Ok(Catalog {
        families,
        target: target.map(str::to_string),
    })
}

fn sov_family(
    profile: &LanguageProfile,
    target: Option<&str>,
    negated: bool,
) -> Result<Family, PatternError> {
    let kind = if negated {
        FamilyKind::NegatedSov
    } else {
        FamilyKind::Sov
    };

    let variants = match target {
        None => vec![Variant {
            name: kind.name().to_string(),
            target_slot: TargetSlot::None,
            pattern: sov_pattern(profile, None, negated)?,
        }],
        Some(target) => vec![
            Variant {
                name: format!("{}:target_subject", kind.name()),
                target_slot: TargetSlot::Subject,
                pattern: sov_pattern(profile, Some((TargetSlot::Subject, target)), negated)?,
            },
            Variant {
                name: format!("{}:target_object", kind.name()),
                target_slot: TargetSlot::Object,
                pattern: sov_pattern(profile, Some((TargetSlot::Object, target)), negated)?,
            },
        ],
    };

    Ok(Family { kind, variants })
}

fn sov_pattern(
    profile: &LanguageProfile,
    target: Option<(TargetSlot, &str)>,
    negated: bool,
) -> Result<Pattern, PatternError> {
    let mut subject = Predicate::deprel_in(&profile.subject_deprels);
    let mut object = Predicate::deprel_in(&profile.object_deprels);
    match target {
        Some((TargetSlot::Subject, lemma)) => subject = subject.and(Predicate::lemma_is(lemma)),
        Some((TargetSlot::Object, lemma)) => object = object.and(Predicate::lemma_is(lemma)),
        _ => {}
    }

    let pattern = Pattern::anchored(VERB, Predicate::upos(&profile.verb_pos))
        .with(SUBJECT, VERB, RelOp::Child, subject)?
        .with(OBJECT, VERB, RelOp::Child, object)?;

    if negated {
        pattern.with(
            NEGATION,
            VERB,
            RelOp::Child,
            Predicate::deprel(&profile.negation_deprel),
        )
    } else {
        Ok(pattern)
    }
}

fn target_modifier_pattern(profile: &LanguageProfile, target: &str) -> Result<Pattern, PatternError> {
    Pattern::anchored(TARGET, Predicate::lemma_is(target)).with(
        MODIFIER,
        TARGET,
        RelOp::Descendant,
        Predicate::deprel_in(&profile.modifier_deprels),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untargeted_catalog() {
        let catalog = compile_catalog(&LanguageProfile::english(), None, false).unwrap();

        assert_eq!(catalog.families().len(), 1);
        let sov = catalog.family(FamilyKind::Sov).unwrap();
        assert_eq!(sov.variants.len(), 1);
        assert_eq!(sov.variants[0].name, "sov");
        assert_eq!(sov.variants[0].pattern.len(), 3);
        assert_eq!(
            sov.variants[0].pattern.names().collect::<Vec<_>>(),
            [VERB, SUBJECT, OBJECT]
        );
        assert!(catalog.target().is_none());
    }

    #[test]
    fn test_negation_adds_four_node_family() {
        let catalog = compile_catalog(&LanguageProfile::english(), None, true).unwrap();
        let negated = catalog.family(FamilyKind::NegatedSov).unwrap();

        assert_eq!(negated.variants[0].pattern.len(), 4);
        assert_eq!(
            negated.variants[0].pattern.nodes()[3].predicate,
            Predicate::deprel("neg")
        );
    }

    #[test]
    fn test_targeted_catalog_has_two_sov_variants() {
        let catalog =
            compile_catalog(&LanguageProfile::english(), Some("Mouse"), true).unwrap();

        assert_eq!(catalog.target(), Some("Mouse"));
        assert_eq!(catalog.families().len(), 3);
        assert_eq!(catalog.pattern_count(), 5);

        let sov = catalog.family(FamilyKind::Sov).unwrap();
        let slots: Vec<_> = sov.variants.iter().map(|v| v.target_slot).collect();
        assert_eq!(slots, [TargetSlot::Subject, TargetSlot::Object]);
        assert_eq!(sov.variants[1].name, "sov:target_object");

        let object = &sov.variants[1].pattern.nodes()[2].predicate;
        assert!(matches!(object, Predicate::And(parts) if parts.len() == 2));

        let modifier = catalog.family(FamilyKind::TargetModifier).unwrap();
        let nodes = modifier.variants[0].pattern.nodes();
        assert_eq!(nodes[1].anchor, Some((0, RelOp::Descendant)));
    }

    #[test]
    fn test_blank_target_is_ignored() {
        let catalog = compile_catalog(&LanguageProfile::french(), Some("  "), false).unwrap();
        assert_eq!(catalog.families().len(), 1);
        assert!(catalog.target().is_none());
    }

    #[test]
    fn test_family_arity() {
        assert_eq!(FamilyKind::Sov.arity(), 3);
        assert_eq!(FamilyKind::NegatedSov.arity(), 4);
        assert_eq!(FamilyKind::TargetModifier.arity(), 2);
    }
}
