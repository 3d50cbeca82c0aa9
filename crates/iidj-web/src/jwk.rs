use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::Algorithm;
use jsonwebtoken::jwk::{
    AlgorithmParameters, CommonParameters, EllipticCurve, EllipticCurveKeyParameters,
    EllipticCurveKeyType, Jwk, JwkSet, KeyAlgorithm, PublicKeyUse, RSAKeyParameters, RSAKeyType,
};

use iidj_keys::{Curve, PublicKey, PublicKeyComponents};

use crate::error::ApiError;

fn key_algorithm(alg: Algorithm) -> Result<KeyAlgorithm, ApiError> {
    match alg {
        Algorithm::ES256 => Ok(KeyAlgorithm::ES256),
        Algorithm::ES384 => Ok(KeyAlgorithm::ES384),
        Algorithm::RS256 => Ok(KeyAlgorithm::RS256),
        other => Err(ApiError::Internal(format!(
            "no JWK algorithm for {other:?}"
        ))),
    }
}

/// Verification key for `kid`, marked for signature use with `alg`.
pub fn to_jwk(kid: &str, key: &PublicKey, alg: Algorithm) -> Result<Jwk, ApiError> {
    let algorithm = match key.components() {
        PublicKeyComponents::Ec { curve, x, y } => {
            AlgorithmParameters::EllipticCurve(EllipticCurveKeyParameters {
                key_type: EllipticCurveKeyType::EC,
                curve: match curve {
                    Curve::P256 => EllipticCurve::P256,
                    Curve::P384 => EllipticCurve::P384,
                },
                x: URL_SAFE_NO_PAD.encode(x),
                y: URL_SAFE_NO_PAD.encode(y),
            })
        }
        PublicKeyComponents::Rsa { n, e } => AlgorithmParameters::RSA(RSAKeyParameters {
            key_type: RSAKeyType::RSA,
            n: URL_SAFE_NO_PAD.encode(n),
            e: URL_SAFE_NO_PAD.encode(e),
        }),
    };

    Ok(Jwk {
        common: CommonParameters {
            public_key_use: Some(PublicKeyUse::Signature),
            key_algorithm: Some(key_algorithm(alg)?),
            key_id: Some(kid.to_string()),
            ..Default::default()
        },
        algorithm,
    })
}

/// Key set with one entry per published key, in iteration order.
pub fn key_set<'a>(
    keys: impl IntoIterator<Item = (&'a String, &'a PublicKey)>,
    alg: Algorithm,
) -> Result<JwkSet, ApiError> {
    let keys = keys
        .into_iter()
        .map(|(kid, key)| to_jwk(kid, key, alg))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(JwkSet { keys })
}
