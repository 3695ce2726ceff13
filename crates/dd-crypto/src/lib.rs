use alloy_primitives::{Address, B256, eip191_hash_message, keccak256};
use anyhow::{Result, anyhow};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

/// A key that can produce EIP-191 personal-message signatures.
pub trait Signer: Send + Sync {
    fn address(&self) -> Address;
    fn sign_personal(&self, message: &[u8]) -> Result<Vec<u8>>;
}

/// In-process secp256k1 key, used by the simulated browser wallet.
pub struct LocalSigner {
    signing_key: SigningKey,
    address: Address,
}

impl LocalSigner {
    pub fn new_random() -> Self {
        let mut rng = OsRng;
        Self::from_signing_key(SigningKey::random(&mut rng))
    }

    pub fn from_secret_key_bytes(secret_key: [u8; 32]) -> Result<Self> {
        let signing_key =
            SigningKey::from_slice(&secret_key).map_err(|err| anyhow!("invalid secret key: {err}"))?;
        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = address_from_verifying_key(signing_key.verifying_key());
        Self {
            signing_key,
            address,
        }
    }

    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }

    pub fn sign_hash(&self, hash: &B256) -> Result<[u8; 65]> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(hash.as_slice())
            .map_err(|err| anyhow!("signing failed: {err}"))?;

        let mut output = [0_u8; 65];
        output[..64].copy_from_slice(&signature.to_bytes());
        output[64] = 27 + recovery_id.to_byte();
        Ok(output)
    }
}

impl Signer for LocalSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_personal(&self, message: &[u8]) -> Result<Vec<u8>> {
        let hash = eip191_hash_message(message);
        Ok(self.sign_hash(&hash)?.to_vec())
    }
}

/// Ethereum address of a public key: the last 20 bytes of keccak256 over the
/// uncompressed point without its 0x04 prefix.
pub fn address_from_verifying_key(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let digest = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&digest[12..])
}

/// Recovers the signer of a 65-byte `personal_sign` signature.
pub fn recover_personal_signer(message: &[u8], signature: &[u8]) -> Result<Address> {
    if signature.len() != 65 {
        return Err(anyhow!("invalid signature length: {}", signature.len()));
    }

    let v = signature[64];
    let recovery_byte = if v >= 27 { v - 27 } else { v };
    let recovery_id =
        RecoveryId::from_byte(recovery_byte).ok_or_else(|| anyhow!("invalid recovery id: {v}"))?;
    let parsed = Signature::from_slice(&signature[..64])
        .map_err(|err| anyhow!("invalid signature: {err}"))?;

    let hash = eip191_hash_message(message);
    let key = VerifyingKey::recover_from_prehash(hash.as_slice(), &parsed, recovery_id)
        .map_err(|err| anyhow!("signature recovery failed: {err}"))?;
    Ok(address_from_verifying_key(&key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_key_derives_expected_address() -> Result<()> {
        // First account of the well-known "test test ... junk" mnemonic.
        let secret = alloy_primitives::hex::decode(
            "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )?;
        let mut bytes = [0_u8; 32];
        bytes.copy_from_slice(&secret);

        let signer = LocalSigner::from_secret_key_bytes(bytes)?;
        assert_eq!(
            signer.address(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse::<Address>()?
        );
        assert_eq!(signer.secret_key_bytes(), bytes);
        Ok(())
    }

    #[test]
    fn personal_signature_recovers_to_signer() -> Result<()> {
        let signer = LocalSigner::new_random();
        let signature = signer.sign_personal(b"hello dappdock")?;

        assert_eq!(signature.len(), 65);
        assert!(signature[64] == 27 || signature[64] == 28);
        assert_eq!(recover_personal_signer(b"hello dappdock", &signature)?, signer.address());
        assert_ne!(recover_personal_signer(b"tampered", &signature)?, signer.address());
        Ok(())
    }

    #[test]
    fn rejects_truncated_signature() {
        assert!(recover_personal_signer(b"msg", &[0_u8; 64]).is_err());
    }
}
