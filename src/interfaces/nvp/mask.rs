use super::codec::{FieldToken, decode_record, encode_record};
use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const DEFAULT_SENSITIVE_FIELDS: [&str; 6] = ["ACCT", "CVV2", "PWD", "SWIPE", "MICR", "TRACKDATA"];

/// Which request fields are redacted before a record reaches logs or a
/// [`Response`](crate::domain::response::Response).
///
/// A sensitive value is replaced by a run of `mask_char` of the same byte
/// length, so the masked record still parses with the regular codec. Names are
/// compared ASCII case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskingPolicy {
    pub sensitive_fields: BTreeSet<String>,
    pub mask_char: char,
}

impl Default for MaskingPolicy {
    fn default() -> Self {
        Self {
            sensitive_fields: DEFAULT_SENSITIVE_FIELDS
                .iter()
                .map(|name| name.to_string())
                .collect(),
            mask_char: 'X',
        }
    }
}

impl MaskingPolicy {
    /// A policy that masks only the given fields.
    pub fn with_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sensitive_fields: fields.into_iter().map(|f| f.into().to_ascii_uppercase()).collect(),
            ..Self::default()
        }
    }

    /// Adds another field to the sensitive set.
    pub fn insert(&mut self, field: impl Into<String>) {
        self.sensitive_fields.insert(field.into().to_ascii_uppercase());
    }

    pub fn is_sensitive(&self, name: &str) -> bool {
        self.sensitive_fields
            .iter()
            .any(|field| field.eq_ignore_ascii_case(name))
    }

    /// Masks one token in place when its name is sensitive.
    pub fn mask_token(&self, token: &mut FieldToken) {
        if self.is_sensitive(&token.name) {
            token.value = self.mask_value(&token.value);
        }
    }

    fn mask_value(&self, value: &str) -> String {
        let width = self.mask_char.len_utf8();
        // keep the byte length stable so the [LEN] prefix stays truthful
        let count = value.len() / width;
        let mut masked: String = std::iter::repeat_n(self.mask_char, count).collect();
        masked.extend(std::iter::repeat_n('X', value.len() - count * width));
        masked
    }

    /// Returns a redacted copy of an encoded record.
    pub fn mask_record(&self, record: &str) -> Result<String, CodecError> {
        let mut tokens = decode_record(record)?;
        for token in &mut tokens {
            self.mask_token(token);
        }
        encode_record(&tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::nvp::codec::decode_record;
    use proptest::prelude::*;

    #[test]
    fn test_masks_default_sensitive_fields() {
        let policy = MaskingPolicy::default();
        let record = "TRXTYPE[1]=S&ACCT[16]=4111111111111111&CVV2[3]=123&PWD[6]=s3cret&AMT[5]=10.00";
        let masked = policy.mask_record(record).unwrap();
        assert_eq!(
            masked,
            "TRXTYPE[1]=S&ACCT[16]=XXXXXXXXXXXXXXXX&CVV2[3]=XXX&PWD[6]=XXXXXX&AMT[5]=10.00"
        );
    }

    #[test]
    fn test_case_insensitive_names() {
        let policy = MaskingPolicy::with_fields(["acct"]);
        assert!(policy.is_sensitive("ACCT"));
        assert!(policy.is_sensitive("Acct"));
        assert!(!policy.is_sensitive("PWD"));
    }

    #[test]
    fn test_configured_field_is_masked() {
        let mut policy = MaskingPolicy::with_fields(Vec::<String>::new());
        policy.insert("EMAIL");
        let masked = policy.mask_record("EMAIL[11]=a@b.example&AMT[1]=1").unwrap();
        assert_eq!(masked, "EMAIL[11]=XXXXXXXXXXX&AMT[1]=1");
    }

    #[test]
    fn test_multibyte_value_keeps_byte_length() {
        let policy = MaskingPolicy::with_fields(["PWD"]);
        let masked = policy.mask_record("PWD[6]=pässw").unwrap();
        assert_eq!(masked, "PWD[6]=XXXXXX");
        let tokens = decode_record(&masked).unwrap();
        assert_eq!(tokens[0].value.len(), 6);
    }

    #[test]
    fn test_malformed_record_is_reported() {
        let policy = MaskingPolicy::default();
        assert!(policy.mask_record("ACCT=4111").is_err());
    }

    proptest! {
        #[test]
        fn prop_masked_record_never_leaks_value(
            acct in "[0-9]{12,19}",
            comment in "[a-z&=]{0,16}",
        ) {
            let policy = MaskingPolicy::default();
            let tokens = vec![
                FieldToken::new("ACCT", acct.clone()),
                FieldToken::new("COMMENT1", comment.clone()),
            ];
            let record = encode_record(&tokens).unwrap();
            let masked = policy.mask_record(&record).unwrap();

            prop_assert!(!masked.contains(&acct));
            let decoded = decode_record(&masked).unwrap();
            prop_assert_eq!(decoded.len(), tokens.len());
            prop_assert_eq!(&decoded[1].value, &comment);
        }
    }
}
