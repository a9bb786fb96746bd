//! # Credential structure
//!
//! A credential starts as a [`CredentialDraft`]: issuer, holder, schema
//! references and the subject payload, with a fresh request id and
//! revocation nonce but no proof. Issuance turns it into a
//! [`VerifiableCredential`], whose `proof` field is a non-optional
//! [`CredentialProof`]. A credential with zero or two proofs cannot be
//! constructed.
//!
//! The JSON layout follows the W3C VC data model (`@context`, `type`,
//! `issuanceDate`, `credentialSubject`, `credentialSchema`), extended with
//! the revocation nonce and the encoded core claim.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use zkid_claim::{
    ClaimData, ClaimDescriptor, ClaimOptions, CoreClaim, DataSlots, DecimalScale, MerklizedPayload,
    MerklizedRootPosition, Merklizer, RevocationNonce, SchemaHash, SubjectPosition,
};
use zkid_core::{Did, RequestId, Timestamp, ValidationError};
use zkid_crypto::{Ed25519PublicKey, Ed25519Signature};
use zkid_identity::TreeProof;

use crate::error::VcError;

/// Base JSON-LD context of every credential.
pub const W3C_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";

/// Type entry present on every credential.
pub const VC_TYPE: &str = "VerifiableCredential";

/// `credentialSchema.type` of the schemas referenced by credentials.
pub const SCHEMA_VALIDATOR_TYPE: &str = "JsonSchema2023";

// ---------------------------------------------------------------------------
// Request and draft
// ---------------------------------------------------------------------------

/// Input to [`create_credential`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequest {
    /// Issuer DID.
    pub issuer: Did,
    /// Holder DID; must be a zkid DID so the holder id fits a claim slot.
    pub holder: Did,
    /// URL of the JSON schema.
    pub schema_url: String,
    /// Credential type defined by the schema.
    pub schema_type: String,
    /// JSON-LD context defining `schema_type`.
    pub context_url: String,
    /// Expiration instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<Timestamp>,
    /// Subject attributes.
    pub payload: Value,
}

/// Reference to the schema a credential conforms to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSchema {
    /// Schema URL.
    pub id: String,
    /// Validator type.
    #[serde(rename = "type")]
    pub validator: String,
}

/// An unsigned credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialDraft {
    /// Request id, also the credential id.
    pub id: RequestId,
    /// `[W3C_CONTEXT, context_url]`.
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    /// `[VC_TYPE, schema_type]`.
    #[serde(rename = "type")]
    pub credential_type: Vec<String>,
    /// Issuer DID.
    pub issuer: Did,
    /// Holder DID, repeated as `credentialSubject.id`.
    pub holder: Did,
    /// Creation time of the draft.
    pub issuance_date: Timestamp,
    /// Expiration instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<Timestamp>,
    /// Subject attributes including `id`.
    pub credential_subject: Value,
    /// Schema reference.
    pub credential_schema: CredentialSchema,
    /// Nonce whose presence in the issuer's revocation tree revokes the
    /// credential.
    pub revocation_nonce: RevocationNonce,
}

impl CredentialDraft {
    /// The credential type defined by the schema.
    pub fn schema_type(&self) -> &str {
        self.credential_type.last().map(String::as_str).unwrap_or(VC_TYPE)
    }

    /// The JSON-LD context defining [`schema_type`](Self::schema_type).
    pub fn context_url(&self) -> &str {
        self.context.last().map(String::as_str).unwrap_or(W3C_CONTEXT)
    }

    /// Schema hash of the derived core claim.
    pub fn schema_hash(&self) -> Result<SchemaHash, VcError> {
        Ok(SchemaHash::from_type(self.context_url(), self.schema_type())?)
    }

    /// Merklize the credential subject.
    pub fn merklize(&self, scale: DecimalScale) -> Result<MerklizedPayload, VcError> {
        Ok(Merklizer::new(scale).merklize(&self.credential_subject)?)
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidField {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// Build an unsigned credential with a fresh request id and a CSPRNG
/// revocation nonce.
pub fn create_credential(request: CredentialRequest) -> Result<CredentialDraft, VcError> {
    request.holder.identity_id()?;
    for (field, value) in [("schemaUrl", &request.schema_url), ("contextUrl", &request.context_url)] {
        Url::parse(value).map_err(|e| invalid(field, format!("{value:?} is not a URL: {e}")))?;
    }
    if request.schema_type.is_empty() || request.schema_type.contains(char::is_whitespace) {
        return Err(invalid("schemaType", format!("{:?} is not a type name", request.schema_type)).into());
    }

    let Value::Object(mut subject) = request.payload else {
        return Err(invalid("payload", "must be a JSON object").into());
    };
    match subject.get("id") {
        Some(Value::String(id)) if id == request.holder.as_str() => {}
        Some(other) => {
            return Err(invalid("payload.id", format!("{other} does not name the holder")).into());
        }
        None => {
            subject.insert("id".to_string(), Value::String(request.holder.to_string()));
        }
    }

    let issuance_date = Timestamp::now();
    if let Some(expiration) = request.expiration {
        if expiration <= issuance_date {
            return Err(invalid("expiration", format!("{expiration} is not in the future")).into());
        }
    }

    Ok(CredentialDraft {
        id: RequestId::new(),
        context: vec![W3C_CONTEXT.to_string(), request.context_url],
        credential_type: vec![VC_TYPE.to_string(), request.schema_type],
        issuer: request.issuer,
        holder: request.holder,
        issuance_date,
        expiration_date: request.expiration,
        credential_subject: Value::Object(subject),
        credential_schema: CredentialSchema {
            id: request.schema_url,
            validator: SCHEMA_VALIDATOR_TYPE.to_string(),
        },
        revocation_nonce: RevocationNonce::random(),
    })
}

/// Encode a draft as a core claim.
///
/// The holder id goes in the index subject slot. With `merklized` the
/// subject is merklized and its root stored in `i2`; otherwise up to four
/// attributes are written to the data slots directly.
pub fn derive_core_claim(
    draft: &CredentialDraft,
    merklized: bool,
    scale: DecimalScale,
) -> Result<CoreClaim, VcError> {
    let (data, merklized_position) = if merklized {
        (ClaimData::Merklized(draft.merklize(scale)?.root()), MerklizedRootPosition::Index)
    } else {
        (
            ClaimData::Flat(DataSlots::from_subject(&draft.credential_subject, scale)?),
            MerklizedRootPosition::None,
        )
    };
    let options = ClaimOptions {
        subject_position: SubjectPosition::Index,
        merklized_position,
        updatable: false,
        version: 0,
        revocation_nonce: draft.revocation_nonce,
        expiration: draft.expiration_date,
    };
    Ok(CoreClaim::encode(&ClaimDescriptor {
        schema_hash: draft.schema_hash()?,
        subject: Some(draft.holder.identity_id()?),
        data,
        options,
    })?)
}

// ---------------------------------------------------------------------------
// Proofs
// ---------------------------------------------------------------------------

/// Which proof an issuer attaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProofKind {
    /// Ed25519 signature over the claim commitment.
    Signature,
    /// Inclusion of the claim in the issuer's claims tree.
    MerkleTree,
}

/// Signature over `H(hi, hv)` by a key bound to the issuer via its auth
/// claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureProof {
    /// Signing key.
    pub issuer_key: Ed25519PublicKey,
    /// Signature, 128 hex characters on the wire.
    pub signature: Ed25519Signature,
    /// The issuer's auth claim for `issuer_key`.
    pub issuer_auth_claim: CoreClaim,
    /// Inclusion of the auth claim in the issuer's claims tree.
    pub issuer_auth_proof: TreeProof,
}

/// Inclusion of the core claim in the issuer's claims tree. The snapshot in
/// `claim_proof` carries the issuer state the proof is valid against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleTreeProof {
    /// Claims-tree proof for `hi`.
    pub claim_proof: TreeProof,
}

/// The proof attached to an issued credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CredentialProof {
    /// Issuer signature.
    #[serde(rename = "Ed25519ClaimSignature")]
    Signature(SignatureProof),
    /// Issuer tree inclusion.
    #[serde(rename = "SparseMerkleTreeProof")]
    MerkleProof(MerkleTreeProof),
}

impl CredentialProof {
    /// Kind of this proof.
    pub fn kind(&self) -> ProofKind {
        match self {
            CredentialProof::Signature(_) => ProofKind::Signature,
            CredentialProof::MerkleProof(_) => ProofKind::MerkleTree,
        }
    }
}

// ---------------------------------------------------------------------------
// Issued credential
// ---------------------------------------------------------------------------

/// Whether an issued credential is still valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    /// Nonce absent from the issuer's revocation tree.
    Active,
    /// Nonce present in the issuer's revocation tree.
    Revoked,
}

/// An issued credential with exactly one proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiableCredential {
    /// Credential body.
    #[serde(flatten)]
    pub body: CredentialDraft,
    /// The claim the proof commits to.
    pub core_claim: CoreClaim,
    /// The proof.
    pub proof: CredentialProof,
}

impl VerifiableCredential {
    pub(crate) fn new(body: CredentialDraft, core_claim: CoreClaim, proof: CredentialProof) -> Self {
        Self {
            body,
            core_claim,
            proof,
        }
    }

    /// Credential id.
    pub fn id(&self) -> RequestId {
        self.body.id
    }

    /// Issuer DID.
    pub fn issuer(&self) -> &Did {
        &self.body.issuer
    }

    /// Holder DID.
    pub fn holder(&self) -> &Did {
        &self.body.holder
    }

    /// Revocation nonce.
    pub fn revocation_nonce(&self) -> RevocationNonce {
        self.body.revocation_nonce
    }

    /// Whether the expiration date has passed.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.body.expiration_date.is_some_and(|exp| exp <= now)
    }

    /// Check that the core claim carries this credential's schema, holder,
    /// nonce and expiration.
    pub fn check_claim_binding(&self) -> Result<(), VcError> {
        let desc = self.core_claim.decode()?;
        if desc.schema_hash != self.body.schema_hash()? {
            return Err(VcError::ClaimMismatch("schema hash".to_string()));
        }
        if desc.subject != Some(self.body.holder.identity_id()?) {
            return Err(VcError::ClaimMismatch("subject".to_string()));
        }
        if desc.options.revocation_nonce != self.body.revocation_nonce {
            return Err(VcError::ClaimMismatch("revocation nonce".to_string()));
        }
        if desc.options.expiration != self.body.expiration_date {
            return Err(VcError::ClaimMismatch("expiration".to_string()));
        }
        Ok(())
    }
}
