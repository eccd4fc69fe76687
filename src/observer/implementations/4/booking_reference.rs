// Ring 4: Enrichment - random booking references, BK- plus 8 characters
use async_trait::async_trait;
use rand::Rng;

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing};
use crate::types::{schema, Operation};

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Default)]
pub struct BookingReference;

#[async_trait]
impl Observer for BookingReference {
    fn name(&self) -> &'static str {
        "BookingReference"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Enrichment
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        op == Operation::Create
    }

    fn applies_to_schema(&self, schema: &str) -> bool {
        schema == schema::BOOKINGS
    }

    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        ctx.record.set("booking_reference", generate_reference());
        Ok(())
    }
}

pub fn generate_reference() -> String {
    let mut rng = rand::thread_rng();
    let code: String = (0..8)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("BK-{}", code)
}
