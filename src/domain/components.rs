//! Data objects that contribute fields to a request.
//!
//! Each component validates itself into the transaction's [`ErrorContext`]
//! when the transaction is built and appends its encoded fields when the
//! request is assembled. A component touches nothing but the buffer and the
//! context it is handed.

use super::context::ErrorContext;
use super::diagnostic::{DiagnosticKind, DiagnosticRecord, Severity, codes};
use crate::error::{PaymentError, Result};
use crate::interfaces::nvp::RequestBuilder;
use rust_decimal::Decimal;

/// Most user defined fields (`USER1`..`USER10`) the gateway accepts.
pub const MAX_USER_FIELDS: usize = 10;

pub trait Contribute {
    /// Short name used in diagnostics.
    fn component(&self) -> &'static str;

    /// Records construction-time problems. Defaults to no checks.
    fn validate(&self, _ctx: &mut ErrorContext) {}

    /// Appends this component's fields to `buf`.
    fn contribute(&self, buf: &mut RequestBuilder, ctx: &mut ErrorContext) -> Result<()>;
}

fn require(ctx: &mut ErrorContext, field: &str, value: &str) {
    if value.trim().is_empty() {
        ctx.add(DiagnosticRecord::validation(codes::MISSING_FIELD).with_param(field));
    }
}

/// Merchant login sent with every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub vendor: String,
    pub partner: String,
    pub password: String,
}

impl Credentials {
    pub fn new(
        user: impl Into<String>,
        vendor: impl Into<String>,
        partner: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            vendor: vendor.into(),
            partner: partner.into(),
            password: password.into(),
        }
    }
}

impl Contribute for Credentials {
    fn component(&self) -> &'static str {
        "credentials"
    }

    fn validate(&self, ctx: &mut ErrorContext) {
        require(ctx, "USER", &self.user);
        require(ctx, "VENDOR", &self.vendor);
        require(ctx, "PARTNER", &self.partner);
        require(ctx, "PWD", &self.password);
    }

    fn contribute(&self, buf: &mut RequestBuilder, _ctx: &mut ErrorContext) -> Result<()> {
        buf.push("USER", &self.user)?;
        buf.push("VENDOR", &self.vendor)?;
        buf.push("PARTNER", &self.partner)?;
        buf.push("PWD", &self.password)?;
        Ok(())
    }
}

/// Amount and order references.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Invoice {
    pub amount: Decimal,
    pub currency: Option<String>,
    pub invoice_number: Option<String>,
    pub po_number: Option<String>,
    pub comment: Option<String>,
}

impl Invoice {
    pub fn new(amount: Decimal) -> Self {
        Self {
            amount,
            ..Self::default()
        }
    }

    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn invoice_number(mut self, number: impl Into<String>) -> Self {
        self.invoice_number = Some(number.into());
        self
    }

    pub fn po_number(mut self, number: impl Into<String>) -> Self {
        self.po_number = Some(number.into());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

impl Contribute for Invoice {
    fn component(&self) -> &'static str {
        "invoice"
    }

    fn validate(&self, ctx: &mut ErrorContext) {
        if self.amount < Decimal::ZERO {
            ctx.add(DiagnosticRecord::validation(codes::INVALID_AMOUNT).with_param(self.amount.to_string()));
        }
    }

    fn contribute(&self, buf: &mut RequestBuilder, ctx: &mut ErrorContext) -> Result<()> {
        let rounded = self.amount.round_dp(2);
        if rounded != self.amount {
            ctx.add(
                DiagnosticRecord::new(Severity::Warn, DiagnosticKind::Validation, codes::AMOUNT_ROUNDED)
                    .with_params([self.amount.to_string(), format!("{rounded:.2}")]),
            );
        }
        buf.push("AMT", &format!("{rounded:.2}"))?;
        buf.push_opt("CURRENCY", self.currency.as_deref())?;
        buf.push_opt("INVNUM", self.invoice_number.as_deref())?;
        buf.push_opt("PONUM", self.po_number.as_deref())?;
        buf.push_opt("COMMENT1", self.comment.as_deref())?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AchAccountType {
    Checking,
    Savings,
}

impl AchAccountType {
    const fn code(self) -> &'static str {
        match self {
            Self::Checking => "C",
            Self::Savings => "S",
        }
    }
}

/// The payment instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tender {
    Card {
        number: String,
        /// `MMYY`
        expiry: String,
        cvv: Option<String>,
    },
    Ach {
        account: String,
        routing: String,
        account_type: AchAccountType,
    },
    PayPal {
        email: Option<String>,
    },
}

impl Tender {
    pub fn card(number: impl Into<String>, expiry: impl Into<String>) -> Self {
        Self::Card {
            number: number.into(),
            expiry: expiry.into(),
            cvv: None,
        }
    }

    pub fn with_cvv(self, cvv: impl Into<String>) -> Self {
        match self {
            Self::Card { number, expiry, .. } => Self::Card {
                number,
                expiry,
                cvv: Some(cvv.into()),
            },
            other => other,
        }
    }

    const fn code(&self) -> &'static str {
        match self {
            Self::Card { .. } => "C",
            Self::Ach { .. } => "A",
            Self::PayPal { .. } => "P",
        }
    }
}

impl Contribute for Tender {
    fn component(&self) -> &'static str {
        "tender"
    }

    fn validate(&self, ctx: &mut ErrorContext) {
        match self {
            Self::Card { number, expiry, .. } => {
                require(ctx, "ACCT", number);
                if expiry.len() != 4 || !expiry.bytes().all(|b| b.is_ascii_digit()) {
                    ctx.add(
                        DiagnosticRecord::new(Severity::Error, DiagnosticKind::Validation, codes::INVALID_EXPIRY)
                            .with_param(expiry.as_str()),
                    );
                }
            }
            Self::Ach { account, routing, .. } => {
                require(ctx, "ACCT", account);
                require(ctx, "ABA", routing);
            }
            Self::PayPal { .. } => {}
        }
    }

    fn contribute(&self, buf: &mut RequestBuilder, _ctx: &mut ErrorContext) -> Result<()> {
        buf.push("TENDER", self.code())?;
        match self {
            Self::Card {
                number,
                expiry,
                cvv,
            } => {
                buf.push("ACCT", number)?;
                buf.push("EXPDATE", expiry)?;
                buf.push_opt("CVV2", cvv.as_deref())?;
            }
            Self::Ach {
                account,
                routing,
                account_type,
            } => {
                buf.push("ACCT", account)?;
                buf.push("ABA", routing)?;
                buf.push("ACCTTYPE", account_type.code())?;
            }
            Self::PayPal { email } => {
                buf.push_opt("EMAIL", email.as_deref())?;
            }
        }
        Ok(())
    }
}

/// A raw extension field passed through to the gateway untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendData {
    pub name: String,
    pub value: String,
}

impl ExtendData {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Contribute for ExtendData {
    fn component(&self) -> &'static str {
        "extend data"
    }

    fn contribute(&self, buf: &mut RequestBuilder, _ctx: &mut ErrorContext) -> Result<()> {
        buf.push(&self.name, &self.value).map_err(|err| PaymentError::Contribution {
            component: self.component(),
            reason: err.to_string(),
        })
    }
}

/// Free-form merchant fields echoed back in reports.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserDefinedFields {
    values: Vec<String>,
}

impl UserDefinedFields {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Contribute for UserDefinedFields {
    fn component(&self) -> &'static str {
        "user defined fields"
    }

    fn validate(&self, ctx: &mut ErrorContext) {
        if self.values.len() > MAX_USER_FIELDS {
            ctx.add(
                DiagnosticRecord::new(Severity::Warn, DiagnosticKind::Validation, codes::TOO_MANY_USER_FIELDS)
                    .with_params([self.values.len().to_string(), MAX_USER_FIELDS.to_string()]),
            );
        }
    }

    fn contribute(&self, buf: &mut RequestBuilder, _ctx: &mut ErrorContext) -> Result<()> {
        for (i, value) in self.values.iter().take(MAX_USER_FIELDS).enumerate() {
            buf.push(&format!("USER{}", i + 1), value)?;
        }
        Ok(())
    }
}

/// Outcome of a 3-D Secure buyer authentication, forwarded with the payment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuyerAuthStatus {
    pub status: String,
    pub authentication_id: Option<String>,
    pub cavv: Option<String>,
    pub eci: Option<String>,
    pub xid: Option<String>,
}

impl BuyerAuthStatus {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            ..Self::default()
        }
    }
}

impl Contribute for BuyerAuthStatus {
    fn component(&self) -> &'static str {
        "buyer auth status"
    }

    fn validate(&self, ctx: &mut ErrorContext) {
        require(ctx, "AUTHENTICATION_STATUS", &self.status);
    }

    fn contribute(&self, buf: &mut RequestBuilder, _ctx: &mut ErrorContext) -> Result<()> {
        buf.push("AUTHENTICATION_STATUS", &self.status)?;
        buf.push_opt("AUTHENTICATION_ID", self.authentication_id.as_deref())?;
        buf.push_opt("CAVV", self.cavv.as_deref())?;
        buf.push_opt("ECI", self.eci.as_deref())?;
        buf.push_opt("XID", self.xid.as_deref())?;
        Ok(())
    }
}
