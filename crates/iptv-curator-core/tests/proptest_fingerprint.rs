use iptv_curator_core::upstream::ApiParams;
use proptest::prelude::*;

proptest! {
    /// The fingerprint ignores the order parameters were supplied in.
    #[test]
    fn fingerprint_is_order_independent(
        pairs in proptest::collection::btree_map("[a-z_]{1,12}", "[A-Za-z0-9]{0,16}", 0..8)
    ) {
        let forward: ApiParams = pairs.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let backward: ApiParams = pairs.iter().rev().map(|(k, v)| (k.clone(), v.clone())).collect();

        let endpoint = "http://x.tv/player_api.php";
        prop_assert_eq!(forward.fingerprint(endpoint), backward.fingerprint(endpoint));
    }

    /// Changing any value changes the fingerprint.
    #[test]
    fn fingerprint_tracks_values(
        key in "[a-z_]{1,12}",
        a in "[A-Za-z0-9]{1,16}",
        b in "[A-Za-z0-9]{1,16}",
    ) {
        prop_assume!(a != b);
        let endpoint = "http://x.tv/player_api.php";
        let left = ApiParams::default().with(&key, a);
        let right = ApiParams::default().with(&key, b);
        prop_assert_ne!(left.fingerprint(endpoint), right.fingerprint(endpoint));
    }
}
