//! The default encrypt/decrypt hooks, registered under reserved names that
//! the handler pipeline looks up by name to substitute the payload.

use bytes::Bytes;
use s3proxy_hooks::{Event, EventRegistry, Hook, HookRequest, HookValue, RegistryError};
use std::sync::Arc;
use tracing::warn;

pub const HOOK_ENCRYPT_DATA: &str = "hook_encrypt_data";
pub const HOOK_DECRYPT_DATA: &str = "hook_decrypt_data";

struct EncryptHook {
    secret: String,
}

impl Hook for EncryptHook {
    fn call(&self, request: &HookRequest, data: Option<&[u8]>) -> (bool, Option<HookValue>) {
        let Some(object_name) = request.object_name.as_deref() else {
            return (true, None);
        };
        let key = s3proxy_crypto::generate_key(&self.secret, object_name);
        match s3proxy_crypto::encrypt(&key, data.unwrap_or_default()) {
            Ok(token) => (true, Some(HookValue::Bytes(Bytes::from(token.into_bytes())))),
            Err(_) => {
                warn!(object = %object_name, "encryption failed");
                (false, Some(HookValue::Text("Encryption failed.".to_string())))
            }
        }
    }
}

struct DecryptHook {
    secret: String,
}

impl Hook for DecryptHook {
    fn call(&self, request: &HookRequest, data: Option<&[u8]>) -> (bool, Option<HookValue>) {
        let Some(object_name) = request.object_name.as_deref() else {
            return (true, None);
        };
        let key = s3proxy_crypto::generate_key(&self.secret, object_name);
        let token = String::from_utf8_lossy(data.unwrap_or_default());
        match s3proxy_crypto::decrypt(&key, &token) {
            Ok(plaintext) => (true, Some(HookValue::Bytes(Bytes::from(plaintext)))),
            Err(_) => (
                false,
                Some(HookValue::Text("Decryption of {s3obj} failed.".to_string())),
            ),
        }
    }
}

/// Register the default encrypt/decrypt hooks at position 0 of their
/// respective events. Called once at startup, before the listener starts
/// accepting connections.
pub fn register(events: &EventRegistry, secret: &str) -> Result<(), RegistryError> {
    register_on(&events.pre_upload_before_check, HOOK_ENCRYPT_DATA, Arc::new(EncryptHook {
        secret: secret.to_string(),
    }))?;
    register_on(&events.post_retrieve_data, HOOK_DECRYPT_DATA, Arc::new(DecryptHook {
        secret: secret.to_string(),
    }))?;
    Ok(())
}

fn register_on(event: &Event, name: &str, hook: Arc<dyn Hook>) -> Result<(), RegistryError> {
    event.register(hook, name, Some(0))
}
