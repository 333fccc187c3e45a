use std::collections::BTreeMap;

use teremok::diagnostics::{
    rank_leaders, score_formula, score_rsp, score_typology, BandLevel, Catalogs, LikertAnswer,
    RspCode, TallyAnswer, TieBreak,
};

fn embedded() -> Catalogs {
    Catalogs::embedded().expect("embedded catalogs are valid")
}

#[test]
fn full_typology_questionnaire_names_an_archetype_for_every_path() {
    let catalogs = embedded();
    let typology = &catalogs.typology;

    for choice in 0..4i64 {
        let answers: BTreeMap<u32, i64> = typology
            .questions
            .iter()
            .map(|question| (question.id, choice))
            .collect();

        let outcome = score_typology(typology, &answers);

        assert_eq!(outcome.skipped, 0, "choice {choice} is valid everywhere");
        assert!(typology.has_category(&outcome.primary));
        let top = outcome.scores.max().expect("points awarded");
        assert_eq!(outcome.scores.get(&outcome.primary), top);
    }
}

#[test]
fn same_choice_everywhere_picks_the_expected_archetype() {
    let catalogs = embedded();
    let all = |choice: i64| -> BTreeMap<u32, i64> { (1..=5).map(|id| (id, choice)).collect() };

    assert_eq!(score_typology(&catalogs.typology, &all(2)).primary, "professional");
    // hamster and fox tie on 5; hamster scored first
    assert_eq!(score_typology(&catalogs.typology, &all(1)).primary, "hamster");
}

#[test]
fn tie_break_policy_only_matters_on_ties() {
    let mut catalogs = embedded();
    let answers: BTreeMap<u32, i64> = [(1, 3), (2, 3), (3, 2)].into_iter().collect();

    let first_awarded = score_typology(&catalogs.typology, &answers);
    catalogs.typology.tie_break = TieBreak::CatalogOrder;
    let catalog_order = score_typology(&catalogs.typology, &answers);

    assert_eq!(first_awarded, catalog_order);
}

#[test]
fn formula_totals_cover_every_band() {
    let catalogs = embedded();
    let uniform = |value: i64| -> Vec<LikertAnswer> { vec![LikertAnswer::from(value); 10] };

    assert_eq!(score_formula(&catalogs.formula, &uniform(4)).band, BandLevel::Green);
    assert_eq!(score_formula(&catalogs.formula, &uniform(3)).band, BandLevel::Yellow);
    assert_eq!(score_formula(&catalogs.formula, &uniform(2)).band, BandLevel::Orange);
    assert_eq!(score_formula(&catalogs.formula, &uniform(1)).band, BandLevel::Red);
}

#[test]
fn rsp_questionnaire_answered_by_catalog_codes() {
    let catalogs = embedded();
    let answers: Vec<TallyAnswer> = catalogs
        .rsp
        .questions
        .iter()
        .map(|question| TallyAnswer::from(question.options[0].code))
        .collect();

    let outcome = score_rsp(&answers);

    assert_eq!(outcome.skipped, 0);
    assert_eq!(outcome.scores.values().sum::<u32>(), 10);
    assert_eq!(outcome.scores[&RspCode::Result], 10);
    assert_eq!(outcome.primary, RspCode::Result);
    assert!(outcome.secondary.is_empty());
    assert_eq!(rank_leaders(&outcome.scores).primary, outcome.primary);
}
