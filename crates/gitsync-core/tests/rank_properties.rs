//! Ordering properties of fractional ranks

use gitsync_core::Rank;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Insert {
    Append,
    Between(prop::sample::Index),
}

fn inserts() -> impl Strategy<Value = Vec<Insert>> {
    prop::collection::vec(
        prop_oneof![
            Just(Insert::Append),
            any::<prop::sample::Index>().prop_map(Insert::Between),
        ],
        1..200,
    )
}

proptest! {
    #[test]
    fn sequence_stays_strictly_ordered(ops in inserts()) {
        let mut ranks = vec![Rank::min().gen_next()];
        for op in ops {
            match op {
                Insert::Append => {
                    let next = ranks.last().unwrap().gen_next();
                    ranks.push(next);
                }
                Insert::Between(index) if ranks.len() > 1 => {
                    let i = index.index(ranks.len() - 1);
                    let mid = Rank::between(&ranks[i], &ranks[i + 1]).unwrap();
                    ranks.insert(i + 1, mid);
                }
                Insert::Between(_) => {}
            }
        }

        for pair in ranks.windows(2) {
            prop_assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
        for rank in &ranks {
            prop_assert!(Rank::parse(rank.as_str()).is_ok());
        }
    }

    #[test]
    fn between_is_strictly_inside(a in "[0-9a-z]{0,5}[1-9a-z]", b in "[0-9a-z]{0,5}[1-9a-z]") {
        let (a, b) = (Rank::parse(&a).unwrap(), Rank::parse(&b).unwrap());
        prop_assume!(a != b);
        let mid = Rank::between(&a, &b).unwrap();
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        prop_assert!(low < mid && mid < high);
    }

    #[test]
    fn gen_next_is_greater(a in "[0-9a-z]{0,8}[1-9a-z]") {
        let rank = Rank::parse(&a).unwrap();
        prop_assert!(rank.gen_next() > rank);
    }
}
