//! End-to-end tests for JWT authentication.
//!
//! Token requests go either to a `MockNetworkLayer`, which records the exact
//! form that was posted, or to a `wiremock` server speaking HTTP. Assertions
//! are verified with the public half of the fixture key.

use std::io::Write;
use std::sync::{Arc, Mutex};

use boxsdk_auth::{
    AssertionClaims, AuthError, BindingState, FixedClock, JwtAuth, JwtAuthConfig, KeyDecoder,
    MockNetworkLayer, PemKeyDecoder, PrivateKeySource, ScriptedRandom, SigningAlgorithm,
    SigningKey, TokenRefresher, JWT_GRANT_TYPE, TOKEN_AUDIENCE,
};
use boxsdk_core::{EnterpriseId, ObjectHandle, SubjectType, User, UserIdentifier};
use chrono::{TimeZone, Utc};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, EncodingKey, Validation};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PRIVATE_KEY: &str = include_str!("fixtures/private_key.pem");
const PRIVATE_KEY_ENCRYPTED: &str = include_str!("fixtures/private_key_encrypted.pem");
const PUBLIC_KEY: &str = include_str!("fixtures/public_key.pem");

const CLIENT_ID: &str = "fake_client_id";
const CLIENT_SECRET: &str = "fake_client_secret";
const KEY_ID: &str = "jwt_key_id_1";
const DEVICE_NAME: &str = "my_awesome_device";

/// 2015-07-06T12:01:02Z
const ISSUED_AT: i64 = 1_436_184_062;

// =============================================================================
// Helpers
// =============================================================================

fn config() -> JwtAuthConfig {
    JwtAuthConfig::new(
        CLIENT_ID,
        CLIENT_SECRET,
        PrivateKeySource::Pem(PRIVATE_KEY.as_bytes().to_vec()),
        KEY_ID,
    )
    .with_device_name(DEVICE_NAME)
}

fn jti_draws(length: usize) -> Vec<f64> {
    (0..length)
        .map(|i| f64::from(u32::try_from(i * 37 % 100).unwrap()) / 100.0)
        .collect()
}

fn expected_jti(draws: &[f64]) -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    draws
        .iter()
        .map(|r| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let index = (r * 62.0).floor() as usize;
            char::from(ALPHABET[index])
        })
        .collect()
}

fn authenticator(
    config: JwtAuthConfig,
    network: Arc<MockNetworkLayer>,
    jti_length: usize,
    exchanges: usize,
) -> JwtAuth {
    JwtAuth::new(config, network)
        .unwrap()
        .with_clock(Arc::new(FixedClock(
            Utc.timestamp_opt(ISSUED_AT, 0).unwrap(),
        )))
        .with_random(Arc::new(ScriptedRandom::repeating(
            jti_length,
            &jti_draws(jti_length),
            exchanges,
        )))
}

fn verify(assertion: &str, algorithm: Algorithm) -> AssertionClaims {
    let header = decode_header(assertion).unwrap();
    assert_eq!(header.alg, algorithm);
    assert_eq!(header.kid.as_deref(), Some(KEY_ID));

    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.set_audience(&[TOKEN_AUDIENCE]);
    let key = DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap();
    decode::<AssertionClaims>(assertion, &key, &validation)
        .unwrap()
        .claims
}

fn form(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// Check the single recorded token request and return its assertion claims.
fn assert_token_request(network: &MockNetworkLayer, algorithm: Algorithm) -> AssertionClaims {
    let requests = network.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];

    assert_eq!(request.url, "https://api.box.com/oauth2/token");
    assert_eq!(request.access_token, None);
    assert_eq!(
        request.header("content-type"),
        Some("application/x-www-form-urlencoded")
    );

    let assertion = request.form_value("assertion").unwrap().to_string();
    assert_eq!(
        request.data,
        form(&[
            ("grant_type", JWT_GRANT_TYPE),
            ("client_id", CLIENT_ID),
            ("client_secret", CLIENT_SECRET),
            ("assertion", &assertion),
            ("box_device_id", "0"),
            ("box_device_name", DEVICE_NAME),
        ])
    );

    verify(&assertion, algorithm)
}

fn assert_claims(claims: &AssertionClaims, sub: &str, sub_type: SubjectType, jti_length: usize) {
    assert_eq!(claims.iss, CLIENT_ID);
    assert_eq!(claims.sub, sub);
    assert_eq!(claims.box_sub_type, sub_type);
    assert_eq!(claims.aud, "https://api.box.com/oauth2/token");
    assert_eq!(claims.jti, expected_jti(&jti_draws(jti_length)));
    assert_eq!(claims.exp, ISSUED_AT + 30);
}

fn enterprise(id: &str) -> EnterpriseId {
    EnterpriseId::new(id).unwrap()
}

/// Counts decode calls and delegates to the real decoder.
#[derive(Default)]
struct CountingDecoder {
    calls: Mutex<Vec<(Vec<u8>, Option<Vec<u8>>)>>,
}

impl KeyDecoder for CountingDecoder {
    fn decode(&self, pem: &[u8], passphrase: Option<&[u8]>) -> boxsdk_auth::Result<SigningKey> {
        self.calls
            .lock()
            .unwrap()
            .push((pem.to_vec(), passphrase.map(<[u8]>::to_vec)));
        PemKeyDecoder.decode(pem, passphrase)
    }
}

// =============================================================================
// Construction
// =============================================================================

#[test]
fn key_path_is_read_and_decoded_once() {
    let cases = [
        (PRIVATE_KEY, None),
        (PRIVATE_KEY_ENCRYPTED, Some(&b"strong_password"[..])),
    ];

    for (pem, passphrase) in cases {
        for algorithm in [SigningAlgorithm::RS256, SigningAlgorithm::RS512] {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            file.write_all(pem.as_bytes()).unwrap();

            let mut config = JwtAuthConfig::new(
                CLIENT_ID,
                CLIENT_SECRET,
                PrivateKeySource::from(file.path()),
                KEY_ID,
            )
            .with_algorithm(algorithm);
            if let Some(passphrase) = passphrase {
                config = config.with_passphrase(passphrase);
            }

            let decoder = CountingDecoder::default();
            JwtAuth::with_decoder(config, Arc::new(MockNetworkLayer::new()), &decoder).unwrap();

            let calls = decoder.calls.lock().unwrap();
            assert_eq!(calls.len(), 1);
            assert_eq!(calls[0].0, pem.as_bytes());
            assert_eq!(calls[0].1.as_deref(), passphrase);
        }
    }
}

#[test]
fn unreadable_key_file_fails_construction() {
    let dir = tempfile::tempdir().unwrap();
    let config = JwtAuthConfig::new(
        CLIENT_ID,
        CLIENT_SECRET,
        PrivateKeySource::Path(dir.path().join("missing.pem")),
        KEY_ID,
    );
    let err = JwtAuth::new(config, Arc::new(MockNetworkLayer::new())).unwrap_err();
    assert!(matches!(err, AuthError::KeyRead { .. }));
}

#[test]
fn wrong_passphrase_fails_construction() {
    let config = JwtAuthConfig::new(
        CLIENT_ID,
        CLIENT_SECRET,
        PrivateKeySource::Pem(PRIVATE_KEY_ENCRYPTED.as_bytes().to_vec()),
        KEY_ID,
    )
    .with_passphrase("not_the_password");
    let err = JwtAuth::new(config, Arc::new(MockNetworkLayer::new())).unwrap_err();
    assert!(err.is_key_load_error());
}

#[tokio::test]
async fn app_settings_file_authenticates_instance() {
    let settings = serde_json::json!({
        "boxAppSettings": {
            "clientID": CLIENT_ID,
            "clientSecret": CLIENT_SECRET,
            "appAuth": {
                "publicKeyID": KEY_ID,
                "privateKey": PRIVATE_KEY_ENCRYPTED,
                "passphrase": "strong_password",
            },
        },
        "enterpriseID": "fake_enterprise_id",
    });
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(settings.to_string().as_bytes()).unwrap();

    let config = JwtAuthConfig::from_app_settings_file(file.path())
        .unwrap()
        .with_device_name(DEVICE_NAME);

    let network = Arc::new(MockNetworkLayer::new());
    network.push_token("tok");
    let auth = authenticator(config, network.clone(), 16, 1);
    auth.authenticate_instance(None).await.unwrap();

    let claims = assert_token_request(&network, Algorithm::RS256);
    assert_claims(&claims, "fake_enterprise_id", SubjectType::Enterprise, 16);
}

#[test]
fn missing_app_settings_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = JwtAuthConfig::from_app_settings_file(dir.path().join("config.json")).unwrap_err();
    assert!(matches!(err, AuthError::Config(_)));
}

#[test]
fn unsupported_user_type_fails_construction() {
    let config = config().with_user(ObjectHandle::new("folder", Some("0".to_string())));
    let err = JwtAuth::new(config, Arc::new(MockNetworkLayer::new())).err();
    assert!(matches!(err, Some(AuthError::UnsupportedIdentityType(_))));
}

// =============================================================================
// User authentication
// =============================================================================

#[tokio::test]
async fn authenticate_user_end_to_end() {
    let network = Arc::new(MockNetworkLayer::new());
    network.push_token("tok123");

    let auth = authenticator(config(), network.clone(), 32, 1);
    let token = auth
        .authenticate_user(Some("fake_user_id".into()))
        .await
        .unwrap();

    assert_eq!(token, "tok123");
    assert_eq!(auth.access_token().as_deref(), Some("tok123"));

    let claims = assert_token_request(&network, Algorithm::RS256);
    assert_claims(&claims, "fake_user_id", SubjectType::User, 32);
}

#[tokio::test]
async fn authenticate_user_accepts_ids_and_handles() {
    let identifiers = [
        UserIdentifier::from("fake_user_id"),
        UserIdentifier::from("fake_user_id".to_string()),
        UserIdentifier::from(User::new("fake_user_id")),
        UserIdentifier::from(ObjectHandle::new("user", Some("fake_user_id".to_string()))),
    ];

    for identifier in identifiers {
        for pass_in_config in [false, true] {
            let network = Arc::new(MockNetworkLayer::new());
            network.push_token("tok");

            let (config, argument) = if pass_in_config {
                (config().with_user(identifier.clone()), None)
            } else {
                (config(), Some(identifier.clone()))
            };

            let auth = authenticator(config, network.clone(), 16, 1);
            auth.authenticate_user(argument).await.unwrap();

            let claims = assert_token_request(&network, Algorithm::RS256);
            assert_claims(&claims, "fake_user_id", SubjectType::User, 16);
        }
    }
}

#[tokio::test]
async fn authenticate_user_saves_user_id_for_future_calls() {
    let network = Arc::new(MockNetworkLayer::new());
    for _ in 0..4 {
        network.push_token("tok");
    }

    let auth = authenticator(config().with_user("fake_user_id_1"), network.clone(), 16, 4);
    for user_id in ["fake_user_id_2", "fake_user_id_3"] {
        auth.authenticate_user(Some(user_id.into())).await.unwrap();
        auth.authenticate_user(None).await.unwrap();
    }

    let subjects: Vec<String> = network
        .requests()
        .iter()
        .map(|r| verify(r.form_value("assertion").unwrap(), Algorithm::RS256))
        .inspect(|claims| assert_eq!(claims.box_sub_type, SubjectType::User))
        .map(|claims| claims.sub)
        .collect();
    assert_eq!(
        subjects,
        [
            "fake_user_id_2",
            "fake_user_id_2",
            "fake_user_id_3",
            "fake_user_id_3"
        ]
    );
}

#[tokio::test]
async fn authenticate_user_without_device_name_sends_empty_name() {
    let network = Arc::new(MockNetworkLayer::new());
    network.push_token("tok123");

    let config = JwtAuthConfig::new(
        CLIENT_ID,
        CLIENT_SECRET,
        PrivateKeySource::Pem(PRIVATE_KEY.as_bytes().to_vec()),
        KEY_ID,
    );
    let auth = authenticator(config, network.clone(), 16, 1);
    auth.authenticate_user(Some("fake_user_id".into()))
        .await
        .unwrap();

    let request = &network.requests()[0];
    let assertion = request.form_value("assertion").unwrap().to_string();
    assert_eq!(
        request.data,
        form(&[
            ("grant_type", JWT_GRANT_TYPE),
            ("client_id", CLIENT_ID),
            ("client_secret", CLIENT_SECRET),
            ("assertion", &assertion),
            ("box_device_id", "0"),
            ("box_device_name", ""),
        ])
    );
}

#[tokio::test]
async fn authenticate_user_treats_empty_id_as_absent() {
    let network = Arc::new(MockNetworkLayer::new());
    network.push_token("first");
    network.push_token("second");

    let auth = authenticator(config(), network.clone(), 16, 2);

    let err = auth.authenticate_user(Some("".into())).await.unwrap_err();
    assert!(matches!(err, AuthError::MissingSubject(SubjectType::User)));
    assert!(network.requests().is_empty());

    auth.authenticate_user(Some("fake_user_id".into()))
        .await
        .unwrap();
    let token = auth.authenticate_user(Some("".into())).await.unwrap();
    assert_eq!(token, "second");

    let requests = network.requests();
    assert_eq!(requests.len(), 2);
    let claims = verify(requests[1].form_value("assertion").unwrap(), Algorithm::RS256);
    assert_eq!(claims.sub, "fake_user_id");
    assert_eq!(claims.box_sub_type, SubjectType::User);
}

#[tokio::test]
async fn authenticate_user_rejects_unsupported_type() {
    let network = Arc::new(MockNetworkLayer::new());
    let auth = authenticator(config(), network.clone(), 16, 1);

    let handle = ObjectHandle::new("user", None);
    let err = auth.authenticate_user(Some(handle.into())).await.unwrap_err();
    assert!(matches!(err, AuthError::UnsupportedIdentityType(_)));
    assert!(network.requests().is_empty());
}

#[tokio::test]
async fn authenticate_without_subject_fails() {
    let network = Arc::new(MockNetworkLayer::new());
    let auth = authenticator(config(), network.clone(), 16, 1);

    assert!(matches!(
        auth.authenticate_user(None).await,
        Err(AuthError::MissingSubject(SubjectType::User))
    ));
    assert!(matches!(
        auth.authenticate_instance(None).await,
        Err(AuthError::MissingSubject(SubjectType::Enterprise))
    ));
    assert!(network.requests().is_empty());
    assert!(auth.access_token().is_none());
}

// =============================================================================
// Instance authentication
// =============================================================================

#[tokio::test]
async fn authenticate_instance_sends_enterprise_claims() {
    let cases = [(true, false), (false, true), (true, true)];

    for (pass_in_config, pass_in_call) in cases {
        let network = Arc::new(MockNetworkLayer::new());
        network.push_token("tok");

        let mut config = config().with_algorithm(SigningAlgorithm::RS512);
        if pass_in_config {
            config = config.with_enterprise_id(enterprise("fake_enterprise_id"));
        }
        let argument = pass_in_call.then(|| enterprise("fake_enterprise_id"));

        let auth = authenticator(config, network.clone(), 128, 1);
        auth.authenticate_instance(argument).await.unwrap();

        let claims = assert_token_request(&network, Algorithm::RS512);
        assert_claims(&claims, "fake_enterprise_id", SubjectType::Enterprise, 128);
    }
}

#[tokio::test]
async fn authenticate_instance_rejects_different_enterprise() {
    let network = Arc::new(MockNetworkLayer::new());
    let auth = authenticator(
        config().with_enterprise_id(enterprise("fake_enterprise_id_1")),
        network.clone(),
        16,
        1,
    );

    let err = auth
        .authenticate_instance(Some(enterprise("fake_enterprise_id_2")))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::IdentityMismatch { .. }));
    assert!(network.requests().is_empty());
}

#[tokio::test]
async fn authenticate_instance_saves_enterprise_id_for_future_calls() {
    let network = Arc::new(MockNetworkLayer::new());
    for _ in 0..3 {
        network.push_token("tok");
    }

    let auth = authenticator(config(), network.clone(), 16, 3);
    let id = enterprise("fake_enterprise_id");

    auth.authenticate_instance(Some(id.clone())).await.unwrap();
    auth.authenticate_instance(None).await.unwrap();
    auth.authenticate_instance(Some(id.clone())).await.unwrap();

    let err = auth
        .authenticate_instance(Some(enterprise("fake_enterprise_id_2")))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::IdentityMismatch { .. }));

    assert_eq!(network.requests().len(), 3);
    assert_eq!(auth.binding(), BindingState::BoundEnterprise(id));
}

// =============================================================================
// Refresh
// =============================================================================

#[tokio::test]
async fn refresh_app_user() {
    let network = Arc::new(MockNetworkLayer::new());
    network.push_token("tok");

    let auth = authenticator(config().with_user("fake_user_id"), network.clone(), 16, 1);
    auth.refresh(None).await.unwrap();

    let claims = assert_token_request(&network, Algorithm::RS256);
    assert_claims(&claims, "fake_user_id", SubjectType::User, 16);
}

#[tokio::test]
async fn refresh_instance() {
    let network = Arc::new(MockNetworkLayer::new());
    network.push_token("tok");

    let auth = authenticator(
        config().with_enterprise_id(enterprise("fake_enterprise_id")),
        network.clone(),
        16,
        1,
    );
    auth.refresh(None).await.unwrap();

    let claims = assert_token_request(&network, Algorithm::RS256);
    assert_claims(&claims, "fake_enterprise_id", SubjectType::Enterprise, 16);
}

#[tokio::test]
async fn refresh_prefers_user_when_both_configured() {
    let network = Arc::new(MockNetworkLayer::new());
    network.push_token("tok");

    let auth = authenticator(
        config()
            .with_enterprise_id(enterprise("fake_enterprise_id"))
            .with_user("fake_user_id"),
        network.clone(),
        16,
        1,
    );
    auth.refresh(None).await.unwrap();

    let claims = assert_token_request(&network, Algorithm::RS256);
    assert_claims(&claims, "fake_user_id", SubjectType::User, 16);
}

#[tokio::test]
async fn refresh_after_instance_ignores_argument() {
    let network = Arc::new(MockNetworkLayer::new());
    network.push_token("first");
    network.push_token("second");

    let auth = authenticator(config(), network.clone(), 16, 2);
    auth.authenticate_instance(Some(enterprise("ent1")))
        .await
        .unwrap();

    let refresher: &dyn TokenRefresher = &auth;
    let token = refresher.refresh(Some("meaningless")).await.unwrap();
    assert_eq!(token, "second");
    assert_eq!(auth.access_token().as_deref(), Some("second"));

    let requests = network.requests();
    assert_eq!(requests.len(), 2);
    let claims = verify(requests[1].form_value("assertion").unwrap(), Algorithm::RS256);
    assert_eq!(claims.sub, "ent1");
    assert_eq!(claims.box_sub_type, SubjectType::Enterprise);
}

// =============================================================================
// Token endpoint over HTTP
// =============================================================================

#[tokio::test]
async fn token_request_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
        ))
        .and(body_string_contains("client_id=fake_client_id"))
        .and(body_string_contains("client_secret=fake_client_secret"))
        .and(body_string_contains("box_device_id=0"))
        .and(body_string_contains("box_device_name=my_awesome_device"))
        .and(body_string_contains("assertion=ey"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "tok123",
            "expires_in": 4169,
            "restricted_to": [],
            "token_type": "bearer",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut api = boxsdk_auth::ApiConfig::default();
    api.oauth2_api_url = format!("{}/oauth2", server.uri());
    let auth = JwtAuth::with_default_network(config().with_api(api)).unwrap();

    let token = auth
        .authenticate_user(Some("fake_user_id".into()))
        .await
        .unwrap();
    assert_eq!(token, "tok123");
    assert_eq!(auth.access_token().as_deref(), Some("tok123"));
}

#[tokio::test]
async fn token_endpoint_error_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Please check the 'sub' claim.",
        })))
        .mount(&server)
        .await;

    let mut api = boxsdk_auth::ApiConfig::default();
    api.oauth2_api_url = format!("{}/oauth2", server.uri());
    let auth = JwtAuth::with_default_network(
        config()
            .with_api(api)
            .with_enterprise_id(enterprise("fake_enterprise_id")),
    )
    .unwrap();

    let err = auth.authenticate_instance(None).await.unwrap_err();
    match err {
        AuthError::Authentication { status, body } => {
            assert_eq!(status, Some(400));
            assert!(body.contains("invalid_grant"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(auth.access_token().is_none());
    assert_eq!(
        auth.binding(),
        BindingState::BoundEnterprise(enterprise("fake_enterprise_id"))
    );
}

#[test]
fn hmac_key_is_rejected_at_signing() {
    struct HmacDecoder;
    impl KeyDecoder for HmacDecoder {
        fn decode(&self, _: &[u8], _: Option<&[u8]>) -> boxsdk_auth::Result<SigningKey> {
            Ok(SigningKey::from_encoding_key(EncodingKey::from_secret(b"s")))
        }
    }

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let network = Arc::new(MockNetworkLayer::new());
    let auth = JwtAuth::with_decoder(config(), network.clone(), &HmacDecoder).unwrap();

    let err = runtime
        .block_on(auth.authenticate_user(Some("u".into())))
        .unwrap_err();
    assert!(matches!(err, AuthError::Signing(_)));
    assert!(network.requests().is_empty());
}
