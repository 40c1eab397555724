//! One-time codes for proving possession of a phone number.
//!
//! Codes live in memory for the lifetime of the process, keyed by mobile
//! number. Each entry remembers when it was issued, and expired entries are
//! swept whenever the store is touched.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::Rng;
use time::{Duration, OffsetDateTime};

use crate::error::{SchoolError, SchoolResult};
use crate::util::current_time;

pub const CODE_LENGTH: usize = 6;

struct PendingCode {
    code: String,
    issued_at: OffsetDateTime,
}

pub struct OtpStore {
    codes: Mutex<HashMap<String, PendingCode>>,
    ttl: Duration,
}

impl OtpStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            codes: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Issues a fresh code, replacing any code still pending for the number.
    pub fn issue(&self, mobile_no: &str) -> String {
        self.issue_at(mobile_no, current_time())
    }

    /// Checks the code without using it up.
    pub fn verify(&self, mobile_no: &str, code: Option<&str>) -> SchoolResult<()> {
        let codes = self.lock_swept(current_time());

        if Self::matches(&codes, mobile_no, code) {
            Ok(())
        } else {
            Err(SchoolError::InvalidOtp)
        }
    }

    /// Consumes the pending code for the number if it matches.
    ///
    /// A wrong code leaves the pending one in place.
    pub fn consume(&self, mobile_no: &str, code: Option<&str>) -> SchoolResult<()> {
        self.consume_at(mobile_no, code, current_time())
    }

    fn issue_at(&self, mobile_no: &str, now: OffsetDateTime) -> String {
        let code = format!(
            "{:0width$}",
            rand::thread_rng().gen_range(0..1_000_000),
            width = CODE_LENGTH
        );

        let mut codes = self.lock_swept(now);
        codes.insert(
            mobile_no.to_owned(),
            PendingCode {
                code: code.clone(),
                issued_at: now,
            },
        );

        code
    }

    fn consume_at(&self, mobile_no: &str, code: Option<&str>, now: OffsetDateTime) -> SchoolResult<()> {
        let mut codes = self.lock_swept(now);

        if Self::matches(&codes, mobile_no, code) {
            codes.remove(mobile_no);
            Ok(())
        } else {
            Err(SchoolError::InvalidOtp)
        }
    }

    fn matches(codes: &HashMap<String, PendingCode>, mobile_no: &str, code: Option<&str>) -> bool {
        let code = code.map(str::trim).filter(|code| !code.is_empty());

        matches!(
            (codes.get(mobile_no), code),
            (Some(pending), Some(code)) if pending.code == code
        )
    }

    fn lock_swept(&self, now: OffsetDateTime) -> MutexGuard<'_, HashMap<String, PendingCode>> {
        let mut codes = self.codes.lock().unwrap_or_else(PoisonError::into_inner);
        let ttl = self.ttl;
        codes.retain(|_, pending| now - pending.issued_at < ttl);

        codes
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.codes.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHONE: &str = "9876543210";

    fn store() -> OtpStore {
        OtpStore::new(Duration::minutes(5))
    }

    #[test]
    fn codes_are_six_digits() {
        let store = store();
        for _ in 0..50 {
            let code = store.issue(PHONE);
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn codes_are_single_use() {
        let store = store();
        let code = store.issue(PHONE);

        assert!(store.consume(PHONE, Some(&code)).is_ok());
        assert!(matches!(
            store.consume(PHONE, Some(&code)),
            Err(SchoolError::InvalidOtp)
        ));
    }

    #[test]
    fn reissuing_replaces_the_pending_code() {
        let store = store();
        let now = current_time();
        let first = store.issue_at(PHONE, now);
        let second = store.issue_at(PHONE, now);

        if first != second {
            assert!(store.consume_at(PHONE, Some(&first), now).is_err());
        }
        assert!(store.consume_at(PHONE, Some(&second), now).is_ok());
    }

    #[test]
    fn wrong_or_missing_codes_keep_the_pending_one() {
        let store = store();
        let code = store.issue(PHONE);
        let wrong = if code == "000000" { "111111" } else { "000000" };

        assert!(store.consume(PHONE, Some(wrong)).is_err());
        assert!(store.consume(PHONE, None).is_err());
        assert!(store.consume(PHONE, Some("  ")).is_err());
        assert!(store.consume(PHONE, Some(&code)).is_ok());
    }

    #[test]
    fn verifying_does_not_use_the_code_up() {
        let store = store();
        let code = store.issue(PHONE);

        assert!(store.verify(PHONE, Some(&code)).is_ok());
        assert!(store.verify(PHONE, Some(&code)).is_ok());
        assert!(store.consume(PHONE, Some(&code)).is_ok());
        assert!(store.verify(PHONE, Some(&code)).is_err());
    }

    #[test]
    fn codes_are_scoped_to_their_number() {
        let store = store();
        let code = store.issue(PHONE);

        assert!(store.consume("9999999999", Some(&code)).is_err());
    }

    #[test]
    fn expired_codes_are_swept() {
        let store = store();
        let issued = current_time() - Duration::minutes(10);
        let code = store.issue_at(PHONE, issued);
        store.issue_at("9123456789", current_time());

        assert!(store.consume(PHONE, Some(&code)).is_err());
        assert_eq!(store.pending(), 1);
    }
}
