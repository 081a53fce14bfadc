use super::components::{
    BuyerAuthStatus, Contribute, Credentials, ExtendData, Invoice, Tender, UserDefinedFields,
};
use super::context::ErrorContext;
use super::diagnostic::{DiagnosticRecord, codes};
use crate::config::Verbosity;
use crate::error::{PaymentError, Result};
use crate::interfaces::nvp::RequestBuilder;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RecurringAction {
    Add,
    Modify,
    Cancel,
    Inquiry,
    Reactivate,
    Payment,
}

impl RecurringAction {
    pub const fn code(self) -> &'static str {
        match self {
            Self::Add => "A",
            Self::Modify => "M",
            Self::Cancel => "C",
            Self::Inquiry => "I",
            Self::Reactivate => "R",
            Self::Payment => "P",
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BuyerAuthStep {
    VerifyEnrollment,
    ValidateAuthentication,
}

/// What the gateway is asked to do. Follow-on kinds carry the PNRef of the
/// transaction they act on.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum TransactionKind {
    Sale,
    Authorization,
    Capture {
        orig_id: String,
    },
    /// Referenced when `orig_id` is set, stand-alone otherwise.
    Credit {
        orig_id: Option<String>,
    },
    Void {
        orig_id: String,
    },
    Inquiry {
        orig_id: String,
    },
    Recurring {
        action: RecurringAction,
        profile_name: Option<String>,
        profile_id: Option<String>,
    },
    BuyerAuth {
        step: BuyerAuthStep,
    },
}

impl TransactionKind {
    /// The `TRXTYPE` wire code.
    pub const fn trx_type(&self) -> &'static str {
        match self {
            Self::Sale => "S",
            Self::Authorization => "A",
            Self::Capture { .. } => "D",
            Self::Credit { .. } => "C",
            Self::Void { .. } => "V",
            Self::Inquiry { .. } => "I",
            Self::Recurring { .. } => "R",
            Self::BuyerAuth {
                step: BuyerAuthStep::VerifyEnrollment,
            } => "E",
            Self::BuyerAuth {
                step: BuyerAuthStep::ValidateAuthentication,
            } => "Z",
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sale => "Sale",
            Self::Authorization => "Authorization",
            Self::Capture { .. } => "Capture",
            Self::Credit { .. } => "Credit",
            Self::Void { .. } => "Void",
            Self::Inquiry { .. } => "Inquiry",
            Self::Recurring { .. } => "Recurring",
            Self::BuyerAuth { .. } => "Buyer Authentication",
        }
    }

    pub fn orig_id(&self) -> Option<&str> {
        match self {
            Self::Capture { orig_id } | Self::Void { orig_id } | Self::Inquiry { orig_id } => {
                Some(orig_id)
            }
            Self::Credit { orig_id } => orig_id.as_deref(),
            _ => None,
        }
    }

    /// Whether the kind moves money against a new instrument and so needs a
    /// tender and an invoice.
    pub const fn needs_payment_data(&self) -> bool {
        matches!(
            self,
            Self::Sale
                | Self::Authorization
                | Self::Credit { orig_id: None }
                | Self::Recurring {
                    action: RecurringAction::Add,
                    ..
                }
                | Self::BuyerAuth {
                    step: BuyerAuthStep::VerifyEnrollment
                }
        )
    }

    fn validate(&self, ctx: &mut ErrorContext) {
        match self {
            Self::Capture { orig_id } | Self::Void { orig_id } | Self::Inquiry { orig_id }
                if orig_id.trim().is_empty() =>
            {
                ctx.add(DiagnosticRecord::validation(codes::MISSING_FIELD).with_param("ORIGID"));
            }
            Self::Recurring {
                action: RecurringAction::Add,
                profile_name,
                ..
            } if profile_name.as_deref().is_none_or(|n| n.trim().is_empty()) => {
                ctx.add(DiagnosticRecord::validation(codes::MISSING_FIELD).with_param("PROFILENAME"));
            }
            Self::Recurring {
                action,
                profile_id,
                ..
            } if *action != RecurringAction::Add
                && profile_id.as_deref().is_none_or(|id| id.trim().is_empty()) =>
            {
                ctx.add(DiagnosticRecord::validation(codes::MISSING_FIELD).with_param("ORIGPROFILEID"));
            }
            _ => {}
        }
    }
}

/// The leading fields of every request: transaction type, verbosity and the
/// kind-specific references.
struct TypeHeader<'a> {
    kind: &'a TransactionKind,
    verbosity: Verbosity,
}

impl Contribute for TypeHeader<'_> {
    fn component(&self) -> &'static str {
        "transaction type"
    }

    fn contribute(&self, buf: &mut RequestBuilder, _ctx: &mut ErrorContext) -> Result<()> {
        buf.push("TRXTYPE", self.kind.trx_type())?;
        buf.push("VERBOSITY", self.verbosity.as_str())?;
        buf.push_opt("ORIGID", self.kind.orig_id())?;
        if let TransactionKind::Recurring {
            action,
            profile_name,
            profile_id,
        } = self.kind
        {
            buf.push("ACTION", action.code())?;
            buf.push_opt("PROFILENAME", profile_name.as_deref())?;
            buf.push_opt("ORIGPROFILEID", profile_id.as_deref())?;
        }
        Ok(())
    }
}

/// A transaction kind plus the components that make up its request.
#[derive(Debug, Clone)]
pub struct TransactionSpec {
    pub kind: TransactionKind,
    /// Falls back to the engine's configured verbosity when unset.
    pub verbosity: Option<Verbosity>,
    pub credentials: Option<Credentials>,
    pub tender: Option<Tender>,
    pub invoice: Option<Invoice>,
    pub extend_data: Vec<ExtendData>,
    pub user_fields: Option<UserDefinedFields>,
    pub buyer_auth: Option<BuyerAuthStatus>,
}

impl TransactionSpec {
    pub fn new(kind: TransactionKind) -> Self {
        Self {
            kind,
            verbosity: None,
            credentials: None,
            tender: None,
            invoice: None,
            extend_data: Vec::new(),
            user_fields: None,
            buyer_auth: None,
        }
    }

    /// Present components in assembly order: extension fields, tender,
    /// invoice, credentials, user defined fields, buyer auth status.
    pub fn components(&self) -> Vec<&dyn Contribute> {
        let mut parts: Vec<&dyn Contribute> = Vec::new();
        parts.extend(self.extend_data.iter().map(|e| e as &dyn Contribute));
        if let Some(tender) = &self.tender {
            parts.push(tender);
        }
        if let Some(invoice) = &self.invoice {
            parts.push(invoice);
        }
        if let Some(credentials) = &self.credentials {
            parts.push(credentials);
        }
        if let Some(user_fields) = &self.user_fields {
            parts.push(user_fields);
        }
        if let Some(buyer_auth) = &self.buyer_auth {
            parts.push(buyer_auth);
        }
        parts
    }

    fn validate(&self, request_id: &str, ctx: &mut ErrorContext) {
        if request_id.trim().is_empty() {
            ctx.add(DiagnosticRecord::validation(codes::MISSING_REQUEST_ID));
        }
        if self.credentials.is_none() {
            ctx.add(DiagnosticRecord::validation(codes::MISSING_CREDENTIALS));
        }
        if self.kind.needs_payment_data() {
            if self.tender.is_none() {
                ctx.add(DiagnosticRecord::validation(codes::MISSING_TENDER).with_param(self.kind.name()));
            }
            if self.invoice.is_none() {
                ctx.add(DiagnosticRecord::validation(codes::MISSING_INVOICE).with_param(self.kind.name()));
            }
        }
        self.kind.validate(ctx);
        for component in self.components() {
            component.validate(ctx);
        }
    }
}

/// One payment operation, from construction to submission.
///
/// Owns its error context and request buffer for its whole life. Submitting
/// consumes it, so a transaction is sent at most once; replay protection is
/// the gateway's job, keyed on `request_id`.
#[derive(Debug)]
pub struct Transaction {
    request_id: String,
    spec: TransactionSpec,
    context: ErrorContext,
    buffer: RequestBuilder,
}

impl Transaction {
    pub fn builder(kind: TransactionKind, request_id: impl Into<String>) -> TransactionBuilder {
        TransactionBuilder::new(kind, request_id)
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn kind(&self) -> &TransactionKind {
        &self.spec.kind
    }

    pub fn spec(&self) -> &TransactionSpec {
        &self.spec
    }

    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ErrorContext {
        &mut self.context
    }

    /// Runs every contributor in order and returns the encoded request.
    ///
    /// A contributor that fails leaves the buffer as it was before assembly
    /// and stops it with [`PaymentError::Contribution`]; recording the failure
    /// is left to the caller.
    pub fn assemble(&mut self, default_verbosity: Verbosity) -> Result<String> {
        let Self {
            spec,
            context,
            buffer,
            ..
        } = self;
        let header = TypeHeader {
            kind: &spec.kind,
            verbosity: spec.verbosity.unwrap_or(default_verbosity),
        };
        let mut parts: Vec<&dyn Contribute> = vec![&header];
        parts.extend(spec.components());

        let start = buffer.checkpoint();
        for part in parts {
            if let Err(err) = part.contribute(buffer, context) {
                buffer.rollback(start);
                return Err(match err {
                    PaymentError::Contribution { .. } => err,
                    other => PaymentError::Contribution {
                        component: part.component(),
                        reason: other.to_string(),
                    },
                });
            }
        }
        Ok(std::mem::take(buffer).finish())
    }

    pub(crate) fn into_parts(self) -> (String, ErrorContext) {
        (self.request_id, self.context)
    }
}

/// Collects the components of a transaction, then validates them into a
/// fresh context in [`build`](Self::build).
#[derive(Debug)]
pub struct TransactionBuilder {
    request_id: String,
    spec: TransactionSpec,
    context: ErrorContext,
}

impl TransactionBuilder {
    pub fn new(kind: TransactionKind, request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            spec: TransactionSpec::new(kind),
            context: ErrorContext::new(),
        }
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.spec.credentials = Some(credentials);
        self
    }

    pub fn tender(mut self, tender: Tender) -> Self {
        self.spec.tender = Some(tender);
        self
    }

    pub fn invoice(mut self, invoice: Invoice) -> Self {
        self.spec.invoice = Some(invoice);
        self
    }

    pub fn extend_data(mut self, data: ExtendData) -> Self {
        self.spec.extend_data.push(data);
        self
    }

    pub fn user_fields(mut self, fields: UserDefinedFields) -> Self {
        self.spec.user_fields = Some(fields);
        self
    }

    pub fn buyer_auth(mut self, status: BuyerAuthStatus) -> Self {
        self.spec.buyer_auth = Some(status);
        self
    }

    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.spec.verbosity = Some(verbosity);
        self
    }

    /// Starts from an existing context instead of an empty one.
    pub fn context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }

    pub fn build(self) -> Transaction {
        let Self {
            request_id,
            spec,
            mut context,
        } = self;
        spec.validate(&request_id, &mut context);
        Transaction {
            request_id,
            spec,
            context,
            buffer: RequestBuilder::new(),
        }
    }
}

pub fn sale(
    request_id: impl Into<String>,
    credentials: Credentials,
    tender: Tender,
    invoice: Invoice,
) -> TransactionBuilder {
    Transaction::builder(TransactionKind::Sale, request_id)
        .credentials(credentials)
        .tender(tender)
        .invoice(invoice)
}

pub fn authorization(
    request_id: impl Into<String>,
    credentials: Credentials,
    tender: Tender,
    invoice: Invoice,
) -> TransactionBuilder {
    Transaction::builder(TransactionKind::Authorization, request_id)
        .credentials(credentials)
        .tender(tender)
        .invoice(invoice)
}

/// Captures a prior authorization, optionally for a different amount.
pub fn capture(
    request_id: impl Into<String>,
    credentials: Credentials,
    orig_id: impl Into<String>,
    invoice: Option<Invoice>,
) -> TransactionBuilder {
    let builder = Transaction::builder(
        TransactionKind::Capture {
            orig_id: orig_id.into(),
        },
        request_id,
    )
    .credentials(credentials);
    match invoice {
        Some(invoice) => builder.invoice(invoice),
        None => builder,
    }
}

/// Refunds a prior transaction.
pub fn credit(
    request_id: impl Into<String>,
    credentials: Credentials,
    orig_id: impl Into<String>,
) -> TransactionBuilder {
    Transaction::builder(
        TransactionKind::Credit {
            orig_id: Some(orig_id.into()),
        },
        request_id,
    )
    .credentials(credentials)
}

pub fn void(
    request_id: impl Into<String>,
    credentials: Credentials,
    orig_id: impl Into<String>,
) -> TransactionBuilder {
    Transaction::builder(
        TransactionKind::Void {
            orig_id: orig_id.into(),
        },
        request_id,
    )
    .credentials(credentials)
}

pub fn inquiry(
    request_id: impl Into<String>,
    credentials: Credentials,
    orig_id: impl Into<String>,
) -> TransactionBuilder {
    Transaction::builder(
        TransactionKind::Inquiry {
            orig_id: orig_id.into(),
        },
        request_id,
    )
    .credentials(credentials)
}

/// Starts a recurring-billing profile.
pub fn recurring_add(
    request_id: impl Into<String>,
    credentials: Credentials,
    profile_name: impl Into<String>,
    tender: Tender,
    invoice: Invoice,
) -> TransactionBuilder {
    Transaction::builder(
        TransactionKind::Recurring {
            action: RecurringAction::Add,
            profile_name: Some(profile_name.into()),
            profile_id: None,
        },
        request_id,
    )
    .credentials(credentials)
    .tender(tender)
    .invoice(invoice)
}

/// Acts on an existing recurring-billing profile.
pub fn recurring(
    request_id: impl Into<String>,
    credentials: Credentials,
    action: RecurringAction,
    profile_id: impl Into<String>,
) -> TransactionBuilder {
    Transaction::builder(
        TransactionKind::Recurring {
            action,
            profile_name: None,
            profile_id: Some(profile_id.into()),
        },
        request_id,
    )
    .credentials(credentials)
}

pub fn buyer_auth(
    request_id: impl Into<String>,
    credentials: Credentials,
    step: BuyerAuthStep,
) -> TransactionBuilder {
    Transaction::builder(TransactionKind::BuyerAuth { step }, request_id).credentials(credentials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::diagnostic::Severity;
    use rust_decimal_macros::dec;

    fn credentials() -> Credentials {
        Credentials::new("merchant", "merchant", "PayPal", "secret")
    }

    fn codes_of(ctx: &ErrorContext) -> Vec<&str> {
        ctx.iter().map(|r| r.code.as_str()).collect()
    }

    #[test]
    fn test_sale_assembles_in_fixed_order() {
        let mut tx = sale(
            "req-1",
            credentials(),
            Tender::card("4111111111111111", "1230"),
            Invoice::new(dec!(10)),
        )
        .extend_data(ExtendData::new("CUSTREF", "A&B"))
        .user_fields(UserDefinedFields::new(["u1"]))
        .build();

        assert!(tx.context().is_empty());
        let record = tx.assemble(Verbosity::High).unwrap();
        assert_eq!(
            record,
            "TRXTYPE[1]=S&VERBOSITY[4]=HIGH&CUSTREF[3]=A&B\
             &TENDER[1]=C&ACCT[16]=4111111111111111&EXPDATE[4]=1230\
             &AMT[5]=10.00\
             &USER[8]=merchant&VENDOR[8]=merchant&PARTNER[6]=PayPal&PWD[6]=secret\
             &USER1[2]=u1"
        );
    }

    #[test]
    fn test_missing_credentials_recorded_at_build_time() {
        let mut tx = Transaction::builder(TransactionKind::Sale, "req-2")
            .tender(Tender::card("4111111111111111", "1230"))
            .invoice(Invoice::new(dec!(1)))
            .build();
        assert_eq!(codes_of(tx.context()), vec![codes::MISSING_CREDENTIALS]);
        assert!(tx.context_mut().is_fatal());
    }

    #[test]
    fn test_sale_without_payment_data() {
        let tx = Transaction::builder(TransactionKind::Sale, "")
            .credentials(credentials())
            .build();
        assert_eq!(
            codes_of(tx.context()),
            vec![codes::MISSING_INVOICE, codes::MISSING_TENDER, codes::MISSING_REQUEST_ID]
        );
        assert_eq!(tx.context().get(0).map(|r| r.parameters[0].as_str()), Some("Sale"));
    }

    #[test]
    fn test_void_carries_orig_id() {
        let mut tx = void("req-3", credentials(), "V19A2E4C9B11").build();
        let record = tx.assemble(Verbosity::Low).unwrap();
        assert!(record.starts_with("TRXTYPE[1]=V&VERBOSITY[3]=LOW&ORIGID[12]=V19A2E4C9B11&USER[8]="));
    }

    #[test]
    fn test_void_with_blank_orig_id_is_fatal() {
        let mut tx = void("req-4", credentials(), " ").build();
        assert_eq!(tx.context_mut().highest_severity(), Some(Severity::Fatal));
        assert_eq!(tx.context().get(0).map(|r| r.parameters[0].as_str()), Some("ORIGID"));
    }

    #[test]
    fn test_referenced_credit_needs_no_tender() {
        let tx = credit("req-5", credentials(), "V19A2E4C9B11").build();
        assert!(tx.context().is_empty());
    }

    #[test]
    fn test_recurring_header() {
        let mut tx = recurring("req-6", credentials(), RecurringAction::Cancel, "RT0000000001").build();
        let record = tx.assemble(Verbosity::Low).unwrap();
        assert!(record.starts_with(
            "TRXTYPE[1]=R&VERBOSITY[3]=LOW&ACTION[1]=C&ORIGPROFILEID[12]=RT0000000001&"
        ));

        let tx = Transaction::builder(
            TransactionKind::Recurring {
                action: RecurringAction::Modify,
                profile_name: None,
                profile_id: None,
            },
            "req-7",
        )
        .credentials(credentials())
        .build();
        assert_eq!(tx.context().get(0).map(|r| r.parameters[0].as_str()), Some("ORIGPROFILEID"));
    }

    #[test]
    fn test_buyer_auth_status_is_last() {
        let mut tx = authorization(
            "req-8",
            credentials(),
            Tender::card("4111111111111111", "1230"),
            Invoice::new(dec!(5)),
        )
        .buyer_auth(BuyerAuthStatus::new("Y"))
        .verbosity(Verbosity::High)
        .build();
        let record = tx.assemble(Verbosity::Low).unwrap();
        assert!(record.starts_with("TRXTYPE[1]=A&VERBOSITY[4]=HIGH&"));
        assert!(record.ends_with("PWD[6]=secret&AUTHENTICATION_STATUS[1]=Y"));
    }

    #[test]
    fn test_failed_contribution_is_rolled_back() {
        let mut tx = sale(
            "req-9",
            credentials(),
            Tender::card("4111111111111111", "1230"),
            Invoice::new(dec!(1)),
        )
        .extend_data(ExtendData::new("OK", "1"))
        .extend_data(ExtendData::new("BROKEN]", "2"))
        .build();

        let err = tx.assemble(Verbosity::Low).unwrap_err();
        assert!(matches!(err, PaymentError::Contribution { component: "extend data", .. }));
    }
}
