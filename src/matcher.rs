//! Higher-order matching of formulas, judgements, and sequents
//!
//! `match_formulas` solves a worklist of equations `pattern = object`,
//! extending a substitution so that applying it to each pattern yields the
//! corresponding object. Beyond first-order matching it supports two
//! extensions required by the quantifier rules:
//!
//! - quantified patterns, matched up to renaming of the bound variable, and
//! - template holes `P(x)` (the `Other` application), where `P` stands for
//!   an arbitrary predicate and `x` for its argument slot. Matching `P(x)`
//!   against a concrete formula records the predicate under `P` and tracks
//!   the argument hole through an internal marker variable `@P<name>`, so
//!   that a later equation `P(e)` binds `e` to whatever concrete term sits
//!   in the hole.
//!
//! Sequent matching can succeed in several ways (any injection of pattern
//! assumptions into concrete assumptions); all unifying substitutions are
//! returned and callers keep the first that leads to a valid step.

#![forbid(unsafe_code)]

use crate::logic::{Formula, Judgement, Operator, Sequent, Speaker, Substitution, Variable};

/// Solve formula equations `(pattern, object)` under `rho`. Returns the
/// extended substitution, or `None` when no unifier exists.
pub fn match_formulas(
    eqs: &[(Formula, Formula)],
    rho: Substitution,
) -> Option<Substitution> {
    let Some(((pat, obj), rest)) = eqs.split_first() else {
        return Some(rho);
    };
    match (pat, obj) {
        (Formula::Var(x), o) => match rho.get(x) {
            Some(bound) => {
                if bound == o {
                    match_formulas(rest, rho)
                } else {
                    None
                }
            }
            None => {
                let mut rho = rho;
                rho.insert(x.clone(), o.clone());
                match_formulas(rest, rho)
            }
        },
        (Formula::App(Operator::Other, args), o) => {
            let (Some(Formula::Var(p)), Some(Formula::Var(x))) = (args.first(), args.get(1))
            else {
                return None;
            };
            let marker = Variable(format!("@P{}", p.0));
            match rho.get(&marker).cloned() {
                Some(Formula::Var(hole)) => {
                    // The predicate hole is already instantiated; re-match
                    // its recorded body against the object to recover the
                    // concrete term in the argument slot.
                    let body = rho.get(p)?.clone();
                    let mut probe = rho.clone();
                    match probe.get(x).cloned() {
                        Some(image) => {
                            probe.insert(hole.clone(), image);
                        }
                        None => {
                            probe.insert(x.clone(), Formula::Var(hole.clone()));
                        }
                    }
                    let solved = match_formulas(&[(body, o.clone())], probe)?;
                    let witness = solved.get(&hole)?.clone();
                    let mut out = solved;
                    out.remove(&hole);
                    out.remove(x);
                    out.insert(x.clone(), witness);
                    match_formulas(rest, out)
                }
                Some(_) => None,
                None => {
                    let mut rho = rho;
                    rho.insert(p.clone(), o.clone());
                    rho.insert(marker, Formula::Var(x.clone()));
                    match_formulas(rest, rho)
                }
            }
        }
        (Formula::App(o1, a1), Formula::App(o2, a2)) => {
            if o1 == o2 && a1.len() == a2.len() {
                let mut eqs: Vec<(Formula, Formula)> = a1
                    .iter()
                    .cloned()
                    .zip(a2.iter().cloned())
                    .collect();
                eqs.extend_from_slice(rest);
                match_formulas(&eqs, rho)
            } else {
                None
            }
        }
        (Formula::Forall(x1, p1), Formula::Forall(x2, p2)) => {
            // Rename the object's bound variable to the pattern's, shadow
            // any outer binding of it during the sub-match, and drop it
            // from the result.
            let mut renaming = Substitution::new();
            renaming.insert(x2.clone(), Formula::Var(x1.clone()));
            let renamed = p2.apply(&renaming);
            let mut shadowed = rho;
            shadowed.remove(x1);
            let mut eqs = vec![((**p1).clone(), renamed)];
            eqs.extend_from_slice(rest);
            let mut out = match_formulas(&eqs, shadowed)?;
            out.remove(x1);
            Some(out)
        }
        (p, o) => {
            if p == o {
                match_formulas(rest, rho)
            } else {
                None
            }
        }
    }
}

/// Lift [`match_formulas`] to judgement equations. A variable speaker on
/// the pattern side binds to the object's speaker.
pub fn match_judgements(
    eqs: &[(Judgement, Judgement)],
    rho: Substitution,
) -> Option<Substitution> {
    let mut rho = rho;
    let mut fmla_eqs = Vec::with_capacity(eqs.len());
    for (pat, obj) in eqs {
        match (pat, obj) {
            (Judgement::Proposition(p), Judgement::Proposition(q)) => {
                fmla_eqs.push((p.clone(), q.clone()));
            }
            (Judgement::Affirmation(Speaker::Var(x), p), Judgement::Affirmation(a, q)) => {
                rho.insert(x.clone(), a.as_formula());
                fmla_eqs.push((p.clone(), q.clone()));
            }
            (
                Judgement::Affirmation(Speaker::Agent(a), p),
                Judgement::Affirmation(Speaker::Agent(b), q),
            ) if a == b => {
                fmla_eqs.push((p.clone(), q.clone()));
            }
            _ => return None,
        }
    }
    match_formulas(&fmla_eqs, rho)
}

/// Unify a schematic sequent against a concrete one, returning every
/// substitution under which they agree. The goal is matched first, then
/// each injection of pattern assumptions into concrete assumptions is
/// tried (so reordering the concrete context never changes matchability).
pub fn match_sequents(
    pattern: &Sequent,
    concrete: &Sequent,
    rho: Substitution,
) -> Vec<Substitution> {
    let mut out = Vec::new();
    if &pattern.apply(&rho) == concrete {
        out.push(rho.clone());
    }
    let Some(rho) = match_judgements(
        &[(pattern.delta.clone(), concrete.delta.clone())],
        rho,
    ) else {
        return out;
    };
    if pattern.gamma.is_empty() {
        out.push(rho);
        return out;
    }
    if pattern.gamma.len() <= concrete.gamma.len() {
        for picked in permutations(&concrete.gamma, pattern.gamma.len()) {
            let eqs: Vec<(Judgement, Judgement)> = pattern
                .gamma
                .iter()
                .cloned()
                .zip(picked.into_iter())
                .collect();
            if let Some(found) = match_judgements(&eqs, rho.clone()) {
                out.push(found);
            }
        }
    }
    out
}

/// All k-permutations of `items`, in index order.
fn permutations(items: &[Judgement], k: usize) -> Vec<Vec<Judgement>> {
    let mut out = Vec::new();
    let mut picked = Vec::with_capacity(k);
    let mut used = vec![false; items.len()];
    fn go(
        items: &[Judgement],
        k: usize,
        used: &mut Vec<bool>,
        picked: &mut Vec<Judgement>,
        out: &mut Vec<Vec<Judgement>>,
    ) {
        if picked.len() == k {
            out.push(picked.clone());
            return;
        }
        for i in 0..items.len() {
            if !used[i] {
                used[i] = true;
                picked.push(items[i].clone());
                go(items, k, used, picked, out);
                picked.pop();
                used[i] = false;
            }
        }
    }
    go(items, k, &mut used, &mut picked, &mut out);
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::Agent;

    fn m(pat: &Formula, obj: &Formula) -> Option<Substitution> {
        match_formulas(&[(pat.clone(), obj.clone())], Substitution::new())
    }

    #[test]
    fn variable_binds_and_must_agree() {
        let pat = Formula::implies(Formula::var("P"), Formula::var("P"));
        let same = Formula::implies(Formula::agent("#a"), Formula::agent("#a"));
        let diff = Formula::implies(Formula::agent("#a"), Formula::agent("#b"));
        assert!(m(&pat, &same).is_some());
        assert!(m(&pat, &diff).is_none());
    }

    #[test]
    fn match_result_reproduces_object() {
        // Invariant: match(P, C) = Some(rho) implies apply(P, rho) == C.
        let pat = Formula::says(
            Formula::var("A"),
            Formula::open(Formula::var("B"), Formula::var("R")),
        );
        let obj = Formula::says(
            Formula::agent("#root"),
            Formula::open(Formula::agent("#b"), Formula::resource("<r>")),
        );
        let rho = m(&pat, &obj).unwrap();
        assert_eq!(pat.apply(&rho), obj);
    }

    #[test]
    fn application_heads_must_agree() {
        let pat = Formula::iskey(Formula::var("A"), Formula::var("k"));
        let obj = Formula::open(Formula::agent("#a"), Formula::resource("<r>"));
        assert!(m(&pat, &obj).is_none());
    }

    #[test]
    fn quantifier_matching_renames_bound_variable() {
        let pat = Formula::forall(
            Variable("x".to_string()),
            Formula::open(Formula::var("x"), Formula::var("R")),
        );
        let obj = Formula::forall(
            Variable("y".to_string()),
            Formula::open(Formula::var("y"), Formula::resource("<r>")),
        );
        let rho = m(&pat, &obj).unwrap();
        assert_eq!(rho.get(&Variable("R".to_string())), Some(&Formula::resource("<r>")));
        // The bound variable never leaks into the result.
        assert!(!rho.contains_key(&Variable("x".to_string())));
    }

    #[test]
    fn template_hole_recovers_argument() {
        // Matching the @L schema premise P(e) after the conclusion bound
        // P(x) to a concrete body: e must come out as the witness term.
        let conclusion_pat = Formula::forall(
            Variable("x".to_string()),
            Formula::template(Formula::var("P"), Formula::var("x")),
        );
        let concrete = Formula::forall(
            Variable("y".to_string()),
            Formula::open(Formula::var("y"), Formula::resource("<r>")),
        );
        let rho = m(&conclusion_pat, &concrete).unwrap();
        let premise_pat = Formula::template(Formula::var("P"), Formula::var("e"));
        let instance = Formula::open(Formula::agent("#a"), Formula::resource("<r>"));
        let rho = match_formulas(&[(premise_pat, instance)], rho).unwrap();
        assert_eq!(
            rho.get(&Variable("e".to_string())),
            Some(&Formula::agent("#a"))
        );
    }

    #[test]
    fn judgement_matching_binds_variable_speaker() {
        let pat = Judgement::aff(
            Speaker::Var(Variable("A".to_string())),
            Formula::var("P"),
        );
        let obj = Judgement::aff(
            Speaker::Agent(Agent("#a".to_string())),
            Formula::truth(),
        );
        let rho = match_judgements(&[(pat, obj)], Substitution::new()).unwrap();
        assert_eq!(
            rho.get(&Variable("A".to_string())),
            Some(&Formula::agent("#a"))
        );
    }

    #[test]
    fn judgement_matching_requires_same_agent() {
        let pat = Judgement::aff(Speaker::Agent(Agent("#a".into())), Formula::var("P"));
        let obj = Judgement::aff(Speaker::Agent(Agent("#b".into())), Formula::truth());
        assert!(match_judgements(&[(pat, obj)], Substitution::new()).is_none());
    }

    #[test]
    fn sequent_matching_is_permutation_closed() {
        let pattern = Sequent::new(
            vec![Judgement::truth(Formula::implies(
                Formula::var("P"),
                Formula::var("Q"),
            ))],
            Judgement::truth(Formula::var("R")),
        );
        let imp = Judgement::truth(Formula::implies(Formula::truth(), Formula::falsity()));
        let other = Judgement::truth(Formula::agent("#a"));
        let fwd = Sequent::new(
            vec![imp.clone(), other.clone()],
            Judgement::truth(Formula::truth()),
        );
        let rev = Sequent::new(vec![other, imp], Judgement::truth(Formula::truth()));
        assert!(!match_sequents(&pattern, &fwd, Substitution::new()).is_empty());
        assert!(!match_sequents(&pattern, &rev, Substitution::new()).is_empty());
    }

    #[test]
    fn sequent_matching_yields_all_injections() {
        // Two implications in the context: the one-assumption pattern must
        // produce (at least) one substitution per choice.
        let pattern = Sequent::new(
            vec![Judgement::truth(Formula::implies(
                Formula::var("P"),
                Formula::var("Q"),
            ))],
            Judgement::truth(Formula::var("R")),
        );
        let concrete = Sequent::new(
            vec![
                Judgement::truth(Formula::implies(Formula::truth(), Formula::falsity())),
                Judgement::truth(Formula::implies(Formula::falsity(), Formula::truth())),
            ],
            Judgement::truth(Formula::truth()),
        );
        let found = match_sequents(&pattern, &concrete, Substitution::new());
        assert!(found.len() >= 2);
    }
}
