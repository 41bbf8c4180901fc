use linkgraph_types::Address;

use crate::hasher::ContentHasher;

/// A revision that participates in a predecessor chain.
pub trait ChainLink {
    /// The revision's own address.
    fn address(&self) -> Address;
    /// The predecessor's address (`None` for the first revision).
    fn predecessor(&self) -> Option<Address>;
    /// Canonical bytes the address was computed from.
    fn payload_bytes(&self) -> Vec<u8>;
}

/// Revision chain integrity verifier.
///
/// Verifies that a sequence of revisions, oldest first, forms a valid chain:
/// each revision's predecessor is the previous revision's address, and each
/// address is the revision hash of its payload. The payload already embeds
/// the predecessor, so the link is covered by the hash.
pub struct RevisionChainVerifier;

impl RevisionChainVerifier {
    /// Verify a chain of revisions, oldest first.
    pub fn verify_chain(revisions: &[impl ChainLink]) -> Result<(), ChainError> {
        let Some(first) = revisions.first() else {
            return Ok(());
        };

        if first.predecessor().is_some() {
            return Err(ChainError::GenesisHasPredecessor);
        }

        for (index, revision) in revisions.iter().enumerate() {
            if index > 0 {
                let expected = revisions[index - 1].address();
                match revision.predecessor() {
                    Some(prev) if prev == expected => {}
                    Some(_) => return Err(ChainError::BrokenLink { index }),
                    None => return Err(ChainError::MissingPredecessor { index }),
                }
            }

            if !ContentHasher::REVISION.verify(&revision.payload_bytes(), &revision.address()) {
                return Err(ChainError::HashMismatch { index });
            }
        }

        Ok(())
    }
}

/// Errors from chain verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("first revision has a predecessor")]
    GenesisHasPredecessor,

    #[error("broken link at index {index}: predecessor does not match")]
    BrokenLink { index: usize },

    #[error("missing predecessor at index {index}")]
    MissingPredecessor { index: usize },

    #[error("hash mismatch at index {index}: computed address differs from stored")]
    HashMismatch { index: usize },
}
