use super::challenge::parse_challenges;
use super::delegate::Credentials;
use super::digest::{
    DigestAlgorithm, DigestChallenge, DigestInput, digest_authorization, digest_response,
    generate_cnonce,
};

fn challenge(raw: &str) -> Option<DigestChallenge> {
    let challenges = parse_challenges([raw]);
    DigestChallenge::from_challenge(&challenges[0])
}

#[test]
fn rfc2617_md5_example() {
    let challenge = challenge(
        r#"Digest realm="testrealm@host.com", qop="auth,auth-int", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#,
    )
    .unwrap();
    let credentials = Credentials::new("Mufasa", "Circle Of Life");
    let input = DigestInput {
        method: "GET",
        uri: "/dir/index.html",
        nonce_count: 1,
        cnonce: "0a4f113b",
    };

    assert_eq!(
        digest_response(&challenge, &credentials, input),
        "6629fae49393a05397450978507c4ef1"
    );

    let header = digest_authorization(&challenge, &credentials, input);
    assert!(header.starts_with("Digest username=\"Mufasa\""));
    assert!(header.contains("nc=00000001"));
    assert!(header.contains("cnonce=\"0a4f113b\""));
    assert!(header.contains("opaque=\"5ccc069c403ebaf9f0171e9517f40e41\""));
    assert!(header.contains("response=\"6629fae49393a05397450978507c4ef1\""));
}

#[test]
fn rfc7616_sha256_and_md5_examples() {
    let base = r#"realm="http-auth@example.org", qop="auth, auth-int", nonce="7ypf/xlj9XXwfDPEoM4URrv/xwf94BcCAzFZH4GiTo0v", opaque="FQhe/qaU925kfnzjCev0ciny7QMkPqMAFRtzCUYo5tdS""#;
    let credentials = Credentials::new("Mufasa", "Circle of Life");
    let input = DigestInput {
        method: "GET",
        uri: "/dir/index.html",
        nonce_count: 1,
        cnonce: "f2/wE4q74E6zIJEtWaHKaf5wv/H5QzzpXusqGemxURZJ",
    };

    let sha = challenge(&format!("Digest {base}, algorithm=SHA-256")).unwrap();
    assert_eq!(sha.algorithm, DigestAlgorithm::Sha256);
    assert_eq!(
        digest_response(&sha, &credentials, input),
        "753927fa0e85d155564e2e272a28d1802ca10daf4496794697cf8db5856cb6c1"
    );

    let md5 = challenge(&format!("Digest {base}, algorithm=MD5")).unwrap();
    assert_eq!(
        digest_response(&md5, &credentials, input),
        "8ca523f5e9506fed4657c9700eebdbec"
    );
}

#[test]
fn legacy_mode_without_qop() {
    let challenge = challenge(r#"Digest realm="r", nonce="n""#).unwrap();
    assert!(!challenge.qop_auth);
    let credentials = Credentials::new("u", "p");
    let input = DigestInput {
        method: "GET",
        uri: "/",
        nonce_count: 1,
        cnonce: "c",
    };
    let ha1 = tether_codec::md5_hex(b"u:r:p");
    let ha2 = tether_codec::md5_hex(b"GET:/");
    let expected = tether_codec::md5_hex(format!("{ha1}:n:{ha2}").as_bytes());
    assert_eq!(digest_response(&challenge, &credentials, input), expected);
    assert!(!digest_authorization(&challenge, &credentials, input).contains("qop="));
}

#[test]
fn session_variant_rehashes_ha1() {
    let plain = challenge(r#"Digest realm="r", nonce="n", qop="auth""#).unwrap();
    let session = challenge(r#"Digest realm="r", nonce="n", qop="auth", algorithm=MD5-sess"#).unwrap();
    let credentials = Credentials::new("u", "p");
    let input = DigestInput {
        method: "GET",
        uri: "/",
        nonce_count: 1,
        cnonce: "c",
    };
    assert_ne!(
        digest_response(&plain, &credentials, input),
        digest_response(&session, &credentials, input)
    );
}

#[test]
fn rejects_unusable_challenges() {
    assert!(challenge(r#"Digest realm="r""#).is_none());
    assert!(challenge(r#"Digest realm="r", nonce="n", algorithm=SHA-512-256"#).is_none());
    assert!(challenge(r#"Digest realm="r", nonce="n", qop="auth-int""#).is_none());
    assert!(challenge(r#"Basic realm="r""#).is_none());
}

#[test]
fn reads_stale_flag() {
    assert!(challenge(r#"Digest realm="r", nonce="n", stale=TRUE"#).unwrap().stale);
    assert!(!challenge(r#"Digest realm="r", nonce="n", stale=false"#).unwrap().stale);
}

#[test]
fn cnonces_are_fresh() {
    let first = generate_cnonce();
    assert_eq!(first.len(), 32);
    assert_ne!(first, generate_cnonce());
}
