use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::Serialize;

use iidj_keys::PrivateKey;

use crate::error::ApiError;

/// `typ` header of issued documents.
pub const DOCUMENT_TYPE: &str = "JOSE+JSON";

/// Sign `claims` as a compact JWS tagged with `kid`.
pub fn sign<T: Serialize>(
    claims: &T,
    kid: &str,
    key: &PrivateKey,
    alg: Algorithm,
) -> Result<String, ApiError> {
    let der = key.signing_der()?;
    let encoding_key = match key {
        PrivateKey::P256(_) | PrivateKey::P384(_) => EncodingKey::from_ec_der(&der),
        PrivateKey::Rsa(_) => EncodingKey::from_rsa_der(&der),
    };

    let mut header = Header::new(alg);
    header.typ = Some(DOCUMENT_TYPE.to_string());
    header.kid = Some(kid.to_string());

    Ok(encode(&header, claims, &encoding_key)?)
}
