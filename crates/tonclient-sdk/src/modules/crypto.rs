use super::ClientContext;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tonclient_kernel::{ClientError, ClientResult};

/// Word count used when the caller does not pick one.
pub const DEFAULT_WORD_COUNT: u32 = 24;

/// A string argument tagged with its encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMessage {
    Text(String),
    Hex(String),
    Base64(String),
}

impl InputMessage {
    /// Build from a format tag: `text`, `hex` or `base64`.
    pub fn parse(format: &str, value: impl Into<String>) -> ClientResult<Self> {
        let value = value.into();
        match format {
            "text" => Ok(Self::Text(value)),
            "hex" => Ok(Self::Hex(value)),
            "base64" => Ok(Self::Base64(value)),
            other => Err(ClientError::InvalidInput(format!(
                "unknown message format {other:?}: one of 'base64, hex, text' should be provided"
            ))),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn hex_bytes(bytes: impl AsRef<[u8]>) -> Self {
        Self::Hex(hex::encode(bytes))
    }

    pub fn base64_bytes(bytes: impl AsRef<[u8]>) -> Self {
        Self::Base64(STANDARD.encode(bytes))
    }

    pub fn format(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Hex(_) => "hex",
            Self::Base64(_) => "base64",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub public: String,
    pub secret: String,
}

impl KeyPair {
    pub fn new(public: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            public: public.into(),
            secret: secret.into(),
        }
    }
}

/// `n` is sent as `logN`, matching the engine's parameter name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamsOfScrypt {
    pub data: String,
    pub salt: InputMessage,
    pub password: InputMessage,
    pub log_n: u32,
    pub r: u32,
    pub p: u32,
    pub dk_len: u32,
}

fn phrase_params(phrase: &str) -> Value {
    json!({ "phrase": phrase, "wordCount": phrase.split(' ').count() })
}

#[derive(Debug, Clone)]
pub struct CryptoModule {
    context: ClientContext,
}

impl CryptoModule {
    pub(crate) fn new(context: ClientContext) -> Self {
        Self { context }
    }

    pub async fn random_generate_bytes(&self, length: u32) -> ClientResult<String> {
        self.context
            .call("crypto.random.generateBytes", &json!({ "length": length }))
            .await
    }

    pub async fn derive_sign_keys(&self, phrase: &str) -> ClientResult<KeyPair> {
        self.context
            .call("crypto.mnemonic.derive.sign.keys", &phrase_params(phrase))
            .await
    }

    pub async fn ton_crc16(&self, input: &InputMessage) -> ClientResult<u32> {
        self.context.call("crypto.ton_crc16", input).await
    }

    pub async fn mnemonic_generate(&self, word_count: u32) -> ClientResult<String> {
        self.context
            .call("crypto.mnemonic.from.random", &json!({ "wordCount": word_count }))
            .await
    }

    pub async fn mnemonic_from_entropy(
        &self,
        entropy: &InputMessage,
        word_count: u32,
    ) -> ClientResult<String> {
        let params = json!({ "wordCount": word_count, "entropy": entropy });
        self.context.call("crypto.mnemonic.from.entropy", &params).await
    }

    pub async fn mnemonic_verify(&self, phrase: &str) -> ClientResult<bool> {
        self.context
            .call("crypto.mnemonic.verify", &phrase_params(phrase))
            .await
    }

    pub async fn mnemonic_words(&self) -> ClientResult<String> {
        self.context.call("crypto.mnemonic.words", &()).await
    }

    pub async fn sha512(&self, message: &InputMessage) -> ClientResult<String> {
        self.context
            .call("crypto.sha512", &json!({ "message": message }))
            .await
    }

    pub async fn sha256(&self, message: &InputMessage) -> ClientResult<String> {
        self.context
            .call("crypto.sha256", &json!({ "message": message }))
            .await
    }

    pub async fn scrypt(&self, params: &ParamsOfScrypt) -> ClientResult<String> {
        self.context.call("crypto.scrypt", params).await
    }

    /// Returns the keystore index of the stored pair.
    pub async fn keystore_add(&self, keys: &KeyPair) -> ClientResult<String> {
        self.context.call("crypto.keystore.add", keys).await
    }

    pub async fn keystore_remove(&self, index: &str) -> ClientResult<()> {
        self.context.call_void("crypto.keystore.remove", index).await
    }

    pub async fn keystore_clear(&self) -> ClientResult<()> {
        self.context.call_void("crypto.keystore.clear", &()).await
    }

    pub async fn hdkey_xprv_from_mnemonic(&self, phrase: &str) -> ClientResult<String> {
        self.context
            .call("crypto.hdkey.xprv.from.mnemonic", &phrase_params(phrase))
            .await
    }

    pub async fn hdkey_xprv_secret(&self, serialized: &str) -> ClientResult<String> {
        self.context
            .call("crypto.hdkey.xprv.secret", &json!({ "serialized": serialized }))
            .await
    }

    pub async fn hdkey_xprv_public(&self, serialized: &str) -> ClientResult<String> {
        self.context
            .call("crypto.hdkey.xprv.public", &json!({ "serialized": serialized }))
            .await
    }

    pub async fn hdkey_xprv_derive_path(&self, serialized: &str, path: &str) -> ClientResult<String> {
        let params = json!({ "serialized": serialized, "path": path });
        self.context.call("crypto.hdkey.xprv.derive.path", &params).await
    }

    pub async fn hdkey_xprv_derive(&self, serialized: &str, index: u32) -> ClientResult<String> {
        let params = json!({ "serialized": serialized, "index": index });
        self.context.call("crypto.hdkey.xprv.derive", &params).await
    }

    /// Factors of a hex-encoded number, as the engine reports them.
    pub async fn factorize(&self, number: &str) -> ClientResult<Value> {
        self.context.call("crypto.math.factorize", number).await
    }

    pub async fn ton_public_key_string(&self, public_key: &str) -> ClientResult<String> {
        self.context.call("crypto.ton_public_key_string", public_key).await
    }

    pub async fn ed25519_keypair(&self) -> ClientResult<KeyPair> {
        self.context.call("crypto.ed25519.keypair", &()).await
    }

    pub async fn modular_power(&self, base: &str, exponent: &str, modulus: &str) -> ClientResult<String> {
        let params = json!({ "base": base, "exponent": exponent, "modulus": modulus });
        self.context.call("crypto.math.modularPower", &params).await
    }

    pub async fn nacl_box_keypair(&self) -> ClientResult<KeyPair> {
        self.context.call("crypto.nacl.box.keypair", &()).await
    }

    pub async fn nacl_box_keypair_from_secret_key(&self, secret_key: &str) -> ClientResult<KeyPair> {
        self.context
            .call("crypto.nacl.box.keypair.fromSecretKey", secret_key)
            .await
    }

    pub async fn nacl_sign_keypair(&self) -> ClientResult<KeyPair> {
        self.context.call("crypto.nacl.sign.keypair", &()).await
    }

    pub async fn nacl_sign_keypair_from_secret_key(&self, secret_key: &str) -> ClientResult<KeyPair> {
        self.context
            .call("crypto.nacl.sign.keypair.fromSecretKey", secret_key)
            .await
    }

    pub async fn nacl_box(
        &self,
        nonce: &str,
        their_public_key: &str,
        message: &InputMessage,
    ) -> ClientResult<String> {
        let params = json!({ "nonce": nonce, "theirPublicKey": their_public_key, "message": message });
        self.context.call("crypto.nacl.box", &params).await
    }

    pub async fn nacl_box_open(
        &self,
        nonce: &str,
        their_public_key: &str,
        secret_key: &str,
        message: &InputMessage,
    ) -> ClientResult<String> {
        let params = json!({
            "nonce": nonce,
            "theirPublicKey": their_public_key,
            "secretKey": secret_key,
            "message": message,
        });
        self.context.call("crypto.nacl.box.open", &params).await
    }

    pub async fn nacl_secret_box(&self, nonce: &str, key: &str, message: &InputMessage) -> ClientResult<String> {
        let params = json!({ "nonce": nonce, "key": key, "message": message });
        self.context.call("crypto.nacl.secret.box", &params).await
    }

    pub async fn nacl_secret_box_open(
        &self,
        nonce: &str,
        key: &str,
        message: &InputMessage,
    ) -> ClientResult<String> {
        let params = json!({ "nonce": nonce, "key": key, "message": message });
        self.context.call("crypto.nacl.secret.box.open", &params).await
    }

    pub async fn nacl_sign(&self, key: &str, message: &InputMessage) -> ClientResult<String> {
        let params = json!({ "key": key, "message": message });
        self.context.call("crypto.nacl.sign", &params).await
    }

    pub async fn nacl_sign_open(&self, key: &str, message: &InputMessage) -> ClientResult<String> {
        let params = json!({ "key": key, "message": message });
        self.context.call("crypto.nacl.sign.open", &params).await
    }

    pub async fn nacl_sign_detached(&self, key: &str, message: &InputMessage) -> ClientResult<String> {
        let params = json!({ "key": key, "message": message });
        self.context.call("crypto.nacl.sign.detached", &params).await
    }
}
