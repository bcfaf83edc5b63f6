use crate::consensus::{
    representative_point, score, select, Consensus, ConsensusResult, Method, PlateauChoice,
    DEFAULT_KAPPA,
};
use crate::plateau::Plateau;
use crate::scan::Curve;
use color_eyre::eyre::{eyre, Report, Result};

/// Build a curve where the total group count equals the restricted group count.
fn simple_curve(counts: &[(u32, usize)]) -> Result<Curve, Report> {
    Curve::from_counts(counts.iter().map(|(t, g)| (*t, *g, *g)))
}

fn selected(consensus: Consensus) -> Result<ConsensusResult, Report> {
    match consensus {
        Consensus::Selected(result) => Ok(result),
        Consensus::NoConsensus { .. } => Err(eyre!("Expected a consensus.")),
    }
}

#[test]
fn two_curve_scenario() -> Result<(), Report> {
    let a = Method::new("ABGD", simple_curve(&[(1, 5), (2, 5), (3, 3), (4, 3), (5, 3)])?);
    let b = Method::new("ASAP", simple_curve(&[(1, 5), (2, 4), (3, 3), (4, 3), (5, 2)])?);

    let result = selected(select(&a, &b, DEFAULT_KAPPA)?)?;
    assert_eq!(3, result.groups);

    let candidates: Vec<_> = result.candidates.iter().map(|c| (c.groups, c.score)).collect();
    assert_eq!(vec![(3, 6.0), (5, 2.0)], candidates);

    assert_eq!(Plateau { start: 3, end: 5 }, result.a.plateau);
    assert_eq!(Plateau { start: 3, end: 4 }, result.b.plateau);
    assert_eq!(3, result.a.length);
    assert_eq!(2, result.b.length);
    assert_eq!(4, result.a.threshold);
    assert_eq!(4, result.b.threshold);
    assert_eq!((3, 3), (result.a.restricted_groups, result.a.total_groups));
    Ok(())
}

#[test]
fn deterministic() -> Result<(), Report> {
    let a = Method::new("ABGD", simple_curve(&[(1, 5), (2, 5), (3, 3), (4, 3), (5, 3)])?);
    let b = Method::new("ASAP", simple_curve(&[(1, 5), (2, 4), (3, 3), (4, 3), (5, 2)])?);

    let expected = select(&a, &b, DEFAULT_KAPPA)?;
    for _ in 0..10 {
        assert_eq!(expected, select(&a, &b, DEFAULT_KAPPA)?);
    }
    Ok(())
}

#[test]
fn no_consensus_keeps_catalogues() -> Result<(), Report> {
    let a = Method::new("ABGD", simple_curve(&[(1, 5), (2, 5), (3, 4)])?);
    let b = Method::new("ASAP", simple_curve(&[(1, 3), (2, 2), (3, 1)])?);

    match select(&a, &b, DEFAULT_KAPPA)? {
        Consensus::NoConsensus { a: plateaus_a, b: plateaus_b } => {
            assert_eq!(a.plateaus, plateaus_a);
            assert_eq!(b.plateaus, plateaus_b);
            assert_eq!(vec![4, 5], plateaus_a.values().collect::<Vec<_>>());
        }
        Consensus::Selected(_) => return Err(eyre!("Expected no consensus.")),
    }
    Ok(())
}

#[test]
fn score_ties_keep_lowest_groups() -> Result<(), Report> {
    // 2 and 4 both have one plateau of length 2 in both methods
    let curve = simple_curve(&[(1, 2), (2, 2), (3, 4), (4, 4)])?;
    let a = Method::new("ABGD", curve.clone());
    let b = Method::new("ASAP", curve);

    let result = selected(select(&a, &b, DEFAULT_KAPPA)?)?;
    assert_eq!(2, result.groups);
    assert_eq!(result.candidates[0].score, result.candidates[1].score);
    Ok(())
}

#[test]
fn total_mode_penalty() -> Result<(), Report> {
    // equal plateaus, but the total group counts disagree for 2
    let a = Method::new("ABGD", Curve::from_counts([(1, 2, 10), (2, 2, 10), (3, 3, 5), (4, 3, 5)])?);
    let b = Method::new("ASAP", Curve::from_counts([(1, 2, 30), (2, 2, 30), (3, 3, 6), (4, 3, 6)])?);

    let result = selected(select(&a, &b, DEFAULT_KAPPA)?)?;
    assert_eq!(3, result.groups);
    let expected = 4.0 * (-1.0_f64 / 20.0).exp();
    assert!((result.score - expected).abs() < 1e-12);

    // a larger kappa forgives more of the disagreement
    let lenient = selected(select(&a, &b, 1000.0)?)?;
    assert!(lenient.candidates[0].score > result.candidates[0].score);

    assert!(select(&a, &b, 0.0).is_err());
    assert!(select(&a, &b, f64::NAN).is_err());
    Ok(())
}

#[test]
fn stability_chooses_plateau() -> Result<(), Report> {
    // two plateaus of 2 groups, the shorter one has a stable total count
    let a = Method::new(
        "ABGD",
        Curve::from_counts([(1, 2, 4), (2, 2, 5), (3, 2, 6), (4, 3, 6), (5, 2, 7), (6, 2, 7)])?,
    );
    let choice = a.choose(2).ok_or_else(|| eyre!("Expected a plateau."))?;
    assert_eq!(Plateau { start: 5, end: 6 }, choice.plateau);
    assert_eq!(7, choice.mode);
    assert_eq!(1.0, choice.proportion);
    assert_eq!(5, choice.length);
    assert!(a.choose(9).is_none());
    Ok(())
}

#[test]
fn score_formula() {
    let choice = |length, mode, proportion| PlateauChoice {
        plateau: Plateau { start: 1, end: 1 },
        mode,
        proportion,
        length,
    };
    let observed = score(&choice(3, 10, 0.5), &choice(4, 30, 1.0), 20.0);
    let expected = 12.0 * 0.5 * (-1.0_f64).exp();
    assert!((observed - expected).abs() < 1e-12);
}

#[test]
fn representative_fallbacks() -> Result<(), Report> {
    let curve = Curve::from_counts([(1, 2, 4), (2, 2, 4), (3, 2, 5), (4, 2, 4), (5, 2, 4)])?;
    let plateau = Plateau { start: 1, end: 5 };

    // median of 1, 2, 4, 5 is 3
    let observed = representative_point(&curve, &plateau, 2, 4).map(|p| p.threshold);
    assert_eq!(Some(3), observed);

    // only threshold 3 has a total of 5
    let observed = representative_point(&curve, &plateau, 2, 5).map(|p| p.threshold);
    assert_eq!(Some(3), observed);

    // no point matches, midpoint of 1 and 5
    let observed = representative_point(&curve, &plateau, 9, 4).map(|p| p.threshold);
    assert_eq!(Some(3), observed);

    // midpoint of 2 and 5 is 3.5, rounded to 4
    let plateau = Plateau { start: 2, end: 5 };
    let observed = representative_point(&curve, &plateau, 9, 4).map(|p| p.threshold);
    assert_eq!(Some(4), observed);

    // midpoint of 3 and 6 is 4.5, rounded to 4
    let plateau = Plateau { start: 3, end: 6 };
    let observed = representative_point(&curve, &plateau, 9, 4).map(|p| p.threshold);
    assert_eq!(Some(4), observed);

    // midpoint is missing from the curve, the closest point is used
    let curve = Curve::from_counts([(1, 2, 4), (2, 2, 4), (6, 2, 4)])?;
    let plateau = Plateau { start: 1, end: 6 };
    let observed = representative_point(&curve, &plateau, 9, 4).map(|p| p.threshold);
    assert_eq!(Some(2), observed);
    Ok(())
}

#[test]
fn summary_table() -> Result<(), Report> {
    let a = Method::new("ABGD", simple_curve(&[(1, 5), (2, 5), (3, 3), (4, 3), (5, 3)])?);
    let b = Method::new("ASAP", simple_curve(&[(1, 5), (2, 4), (3, 3), (4, 3), (5, 2)])?);
    let result = selected(select(&a, &b, DEFAULT_KAPPA)?)?;

    let table = result.to_table();
    assert_eq!(2, table.rows.len());
    assert_eq!("ABGD", table.get("method", 0)?.as_str());
    assert_eq!("4", table.get("threshold", 1)?.as_str());
    assert_eq!("6.0000", table.get("score", 0)?.as_str());

    let plot = result.plot_data(&a, &b);
    assert_eq!(2, plot.methods.len());
    assert_eq!(5, plot.methods[1].curve.len());

    let dir = tempfile::tempdir()?;
    plot.write(&dir.path().join("consensus.json"))?;
    let json = std::fs::read_to_string(dir.path().join("consensus.json"))?;
    let value: serde_json::Value = serde_json::from_str(&json)?;
    assert_eq!(Some(3), value["groups"].as_u64());
    Ok(())
}

#[test]
fn display() -> Result<(), Report> {
    let a = Method::new("ABGD", simple_curve(&[(1, 5), (2, 5), (3, 3), (4, 3), (5, 3)])?);
    let b = Method::new("ASAP", simple_curve(&[(1, 5), (2, 4), (3, 3), (4, 3), (5, 2)])?);
    let result = selected(select(&a, &b, DEFAULT_KAPPA)?)?;

    let observed = result.to_string();
    let lines: Vec<_> = observed.lines().collect();
    assert_eq!("groups: 3", lines[0]);
    assert_eq!("candidates: 3=6.0000, 5=2.0000", lines[2]);
    assert!(lines[3].starts_with("ABGD: threshold 4 (3 restricted, 3 total groups), plateau 3-5"));
    Ok(())
}
