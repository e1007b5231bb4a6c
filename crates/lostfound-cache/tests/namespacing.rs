use lostfound_cache::KeyNamespacer;
use proptest::prelude::*;

fn segment() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_-]{1,12}"
}

proptest! {
    #[test]
    fn distinct_inputs_never_share_a_full_key(
        env_a in segment(),
        env_b in segment(),
        key_a in ".{0,40}",
        key_b in ".{0,40}",
    ) {
        let a = KeyNamespacer::new("lostfound", &env_a).unwrap();
        let b = KeyNamespacer::new("lostfound", &env_b).unwrap();
        let same_input = env_a == env_b && key_a == key_b;
        prop_assert_eq!(a.namespace(&key_a) == b.namespace(&key_b), same_input);
    }

    #[test]
    fn namespace_is_deterministic_and_reversible(env in segment(), key in ".{0,40}") {
        let ns = KeyNamespacer::new("lostfound", &env).unwrap();
        let full = ns.namespace(&key);
        prop_assert_eq!(&full, &ns.namespace(&key));
        prop_assert_eq!(ns.strip(&full), Some(key.as_str()));
    }
}

#[test]
fn environments_are_rejected_when_they_could_collide() {
    assert!(KeyNamespacer::new("lostfound", "dev:prod").is_err());
    assert!(KeyNamespacer::new("lostfound", "").is_err());
    assert!(KeyNamespacer::new("lost found", "dev").is_err());
}
