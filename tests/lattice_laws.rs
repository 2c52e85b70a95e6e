use num_bigint::BigInt;
use proptest::prelude::*;

use fixpoint_rs::congruence::Congruence;
use fixpoint_rs::factory::VariableFactory;
use fixpoint_rs::interval::Interval;
use fixpoint_rs::lattice::Lattice;
use fixpoint_rs::numeric::NumericDomain;
use fixpoint_rs::product::IntervalCongruence;

fn interval() -> impl Strategy<Value = Interval> {
    prop_oneof![
        1 => Just(Interval::bottom()),
        1 => Just(Interval::top()),
        2 => (-50i64..50).prop_map(Interval::at_least),
        2 => (-50i64..50).prop_map(Interval::at_most),
        6 => (-50i64..50, 0i64..40).prop_map(|(lb, len)| Interval::finite(lb, lb + len)),
    ]
}

fn congruence() -> impl Strategy<Value = Congruence> {
    prop_oneof![
        1 => Just(Congruence::bottom()),
        1 => Just(Congruence::top()),
        2 => (-20i64..20).prop_map(Congruence::constant),
        6 => (1i64..12, -20i64..20).prop_map(|(m, r)| Congruence::new(m, r)),
    ]
}

fn join_laws<L: Lattice>(a: &L, b: &L) {
    let ab = a.join(b);
    assert!(a.join(a).equals(a));
    assert!(a.leq(&ab));
    assert!(b.leq(&ab));
    assert!(ab.equals(&b.join(a)));
    assert!(a.join(&L::bottom()).equals(a));
    assert!(a.meet(&L::bottom()).is_bottom());
    let m = a.meet(b);
    assert!(m.leq(a));
    assert!(m.leq(b));
    let w = a.widen(b);
    assert!(a.leq(&w));
    assert!(b.leq(&w));
}

proptest! {
    #[test]
    fn interval_lattice_laws(a in interval(), b in interval(), c in interval()) {
        join_laws(&a, &b);
        prop_assert!(a.join(&b).join(&c).equals(&a.join(&b.join(&c))));
    }

    #[test]
    fn congruence_lattice_laws(a in congruence(), b in congruence(), c in congruence()) {
        join_laws(&a, &b);
        prop_assert!(a.join(&b).join(&c).equals(&a.join(&b.join(&c))));
    }

    #[test]
    fn interval_widening_stabilizes(start in -20i64..20, steps in 1usize..30) {
        let mut w = Interval::singleton(start);
        let mut changes = 0;
        for k in 1..=steps as i64 {
            let next = w.widen(&Interval::finite(start, start + k));
            if !next.equals(&w) {
                changes += 1;
            }
            w = next;
        }
        prop_assert!(changes <= 1);
        prop_assert_eq!(w, Interval::at_least(start));
    }

    #[test]
    fn interval_meet_is_intersection(a in interval(), b in interval(), n in -100i64..100) {
        let n = BigInt::from(n);
        prop_assert_eq!(a.meet(&b).contains(&n), a.contains(&n) && b.contains(&n));
    }

    #[test]
    fn congruence_join_contains_both(a in congruence(), b in congruence(), n in -60i64..60) {
        let n = BigInt::from(n);
        let j = a.join(&b);
        if a.contains(&n) || b.contains(&n) {
            prop_assert!(j.contains(&n));
        }
        prop_assert_eq!(a.meet(&b).contains(&n), a.contains(&n) && b.contains(&n));
    }

    #[test]
    fn reduced_product_is_exact_on_one_variable(i in interval(), c in congruence()) {
        let vars = VariableFactory::new();
        let x = vars.named("x");
        let mut p = IntervalCongruence::top();
        p.refine_interval(x, &i);
        p.refine_congruence(x, &c);
        let (pi, pc) = (p.interval_of(x), p.congruence_of(x));
        for n in -120i64..120 {
            let n = BigInt::from(n);
            let in_product = pi.contains(&n) && pc.contains(&n);
            prop_assert_eq!(in_product, i.contains(&n) && c.contains(&n), "n = {}", n);
        }
    }
}

#[test]
fn test_congruence_join_of_even_constants() {
    let even = Congruence::constant(2).join(&Congruence::constant(4));
    assert_eq!(even, Congruence::new(2, 0));
}

#[test]
fn test_interval_widening_chain() {
    let w1 = Interval::singleton(0).widen(&Interval::finite(0, 1));
    assert_eq!(w1, Interval::at_least(0));
    let w2 = w1.widen(&Interval::finite(0, 2));
    assert_eq!(w2, w1);
}

#[test]
fn test_reduced_product_excludes_other_classes() {
    let vars = VariableFactory::new();
    let x = vars.named("x");
    let mut p = IntervalCongruence::top();
    p.refine_interval(x, &Interval::finite(0, 10));
    p.refine_congruence(x, &Congruence::new(3, 1));
    assert_eq!(p.interval_of(x), Interval::finite(1, 10));
    for n in [0, 2, 3, 5, 6, 8, 9, 11] {
        assert!(!p.interval_of(x).contains(&BigInt::from(n)) || !p.congruence_of(x).contains(&BigInt::from(n)));
    }
    for n in [1, 4, 7, 10] {
        let n = BigInt::from(n);
        assert!(p.interval_of(x).contains(&n) && p.congruence_of(x).contains(&n));
    }
}
