use ed25519_dalek::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const SIGNATURE_HEADER: &str = "X-Signature-Ed25519";
pub const TIMESTAMP_HEADER: &str = "X-Signature-Timestamp";

/// Message flag marking a response as visible only to the invoking user.
pub const EPHEMERAL_FLAG: u64 = 1 << 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InteractionKind {
    Ping,
    ApplicationCommand,
    Other(u8),
}

impl InteractionKind {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Ping,
            2 => Self::ApplicationCommand,
            other => Self::Other(other),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Interaction {
    pub id: String,
    pub application_id: String,
    #[serde(rename = "type")]
    pub kind_code: u8,
    pub data: Option<CommandData>,
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
    /// Present for guild invocations.
    pub member: Option<Member>,
    /// Present for DM invocations.
    pub user: Option<User>,
    pub token: String,
}

impl Interaction {
    pub fn kind(&self) -> InteractionKind {
        InteractionKind::from_code(self.kind_code)
    }

    pub fn invoking_user(&self) -> Option<&User> {
        self.member.as_ref().map(|member| &member.user).or(self.user.as_ref())
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct CommandData {
    pub name: String,
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub value: Option<Value>,
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

impl CommandOption {
    /// The option value as text; numbers are rendered in decimal.
    pub fn text_value(&self) -> Option<String> {
        match self.value.as_ref()? {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Member {
    pub user: User,
}

#[derive(Clone, Debug, Deserialize)]
pub struct User {
    pub id: String,
    pub username: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResponseData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
}

impl InteractionResponse {
    pub const PONG: u8 = 1;
    pub const CHANNEL_MESSAGE: u8 = 4;
    pub const DEFERRED_CHANNEL_MESSAGE: u8 = 5;

    pub fn pong() -> Self {
        Self { kind: Self::PONG, data: None }
    }

    /// "Thinking..." acknowledgement whose follow-up only the invoker sees.
    pub fn deferred_ephemeral() -> Self {
        Self {
            kind: Self::DEFERRED_CHANNEL_MESSAGE,
            data: Some(ResponseData { content: None, flags: Some(EPHEMERAL_FLAG) }),
        }
    }

    pub fn ephemeral_message(content: impl Into<String>) -> Self {
        Self {
            kind: Self::CHANNEL_MESSAGE,
            data: Some(ResponseData { content: Some(content.into()), flags: Some(EPHEMERAL_FLAG) }),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("public key must be 32 hex-encoded bytes")]
    InvalidPublicKey,
    #[error("signature header is missing or malformed")]
    MalformedSignature,
    #[error("signature does not match request")]
    Mismatch,
}

/// Checks Discord's `X-Signature-Ed25519` over `timestamp || body`.
#[derive(Clone, Debug)]
pub struct SignatureVerifier {
    key: VerifyingKey,
}

impl SignatureVerifier {
    pub fn from_hex(public_key: &str) -> Result<Self, SignatureError> {
        let bytes = hex::decode(public_key.trim()).map_err(|_| SignatureError::InvalidPublicKey)?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| SignatureError::InvalidPublicKey)?;
        let key = VerifyingKey::from_bytes(&bytes).map_err(|_| SignatureError::InvalidPublicKey)?;
        Ok(Self { key })
    }

    pub fn verify(&self, signature: &str, timestamp: &str, body: &[u8]) -> Result<(), SignatureError> {
        if signature.is_empty() || timestamp.is_empty() {
            return Err(SignatureError::MalformedSignature);
        }
        let signature = hex::decode(signature).map_err(|_| SignatureError::MalformedSignature)?;
        let signature =
            Signature::from_slice(&signature).map_err(|_| SignatureError::MalformedSignature)?;

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);

        self.key.verify_strict(&message, &signature).map_err(|_| SignatureError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::{Signer, SigningKey};

    use super::{
        Interaction, InteractionKind, InteractionResponse, SignatureError, SignatureVerifier,
    };

    fn signing_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn verifier() -> SignatureVerifier {
        let public = hex::encode(signing_key().verifying_key().to_bytes());
        SignatureVerifier::from_hex(&public).expect("verifier")
    }

    fn sign(timestamp: &str, body: &[u8]) -> String {
        let mut message = timestamp.as_bytes().to_vec();
        message.extend_from_slice(body);
        hex::encode(signing_key().sign(&message).to_bytes())
    }

    #[test]
    fn valid_signature_is_accepted() {
        let body = br#"{"type":1}"#;
        let signature = sign("1700000000", body);

        assert_eq!(verifier().verify(&signature, "1700000000", body), Ok(()));
    }

    #[test]
    fn tampered_body_or_timestamp_is_rejected() {
        let body = br#"{"type":1}"#;
        let signature = sign("1700000000", body);

        assert_eq!(
            verifier().verify(&signature, "1700000000", br#"{"type":2}"#),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(verifier().verify(&signature, "1700000001", body), Err(SignatureError::Mismatch));
    }

    #[test]
    fn malformed_inputs_are_distinguished() {
        assert_eq!(
            verifier().verify("zz", "1700000000", b"{}"),
            Err(SignatureError::MalformedSignature)
        );
        assert_eq!(verifier().verify("", "1700000000", b"{}"), Err(SignatureError::MalformedSignature));
        assert!(matches!(
            SignatureVerifier::from_hex("abcd"),
            Err(SignatureError::InvalidPublicKey)
        ));
    }

    #[test]
    fn responses_serialize_in_discord_shape() {
        let pong = serde_json::to_value(InteractionResponse::pong()).expect("pong");
        assert_eq!(pong, serde_json::json!({"type": 1}));

        let deferred = serde_json::to_value(InteractionResponse::deferred_ephemeral()).expect("ack");
        assert_eq!(deferred, serde_json::json!({"type": 5, "data": {"flags": 64}}));
    }

    #[test]
    fn guild_command_payload_is_decoded() {
        let payload = serde_json::json!({
            "id": "900",
            "application_id": "42",
            "type": 2,
            "token": "interaction-token",
            "guild_id": "7",
            "channel_id": "8",
            "member": {"user": {"id": "55", "username": "siskel"}},
            "data": {
                "id": "1",
                "name": "movie",
                "type": 1,
                "options": [
                    {"name": "movie", "type": 3, "value": "Dune"},
                    {"name": "year", "type": 3, "value": "1984"}
                ]
            }
        });

        let interaction: Interaction = serde_json::from_value(payload).expect("decode");
        assert_eq!(interaction.kind(), InteractionKind::ApplicationCommand);
        assert_eq!(interaction.invoking_user().map(|user| user.id.as_str()), Some("55"));

        let data = interaction.data.expect("data");
        assert_eq!(data.options[1].text_value().as_deref(), Some("1984"));
    }
}
