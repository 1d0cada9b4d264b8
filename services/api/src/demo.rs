use crate::infra::{
    lender_recipients, InMemoryDocumentStore, InMemoryLoanRepository, LogNotificationDispatcher,
    NullValuationProvider,
};
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use lendflow::error::AppError;
use lendflow::links::ActionLinkCodec;
use lendflow::workflows::underwriting::domain::{
    BorrowerProfile, ConditionsSubmission, IntakeForm, LiquidityDocCategory, LiquidityDocument,
    LlcDocument, LlcDocumentKind, LoanType, PastProject, PurchaseDetails, ReferralContact,
    SupportingDocument, UploadedFile,
};
use lendflow::workflows::underwriting::{
    LoanWorkflowService, NewLoanApplication, UnderwritingRules,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Requested loan amount
    #[arg(long, default_value_t = 400_000.0)]
    pub(crate) amount: f64,
    /// Borrower credit score used on the intake forms
    #[arg(long, default_value_t = 742)]
    pub(crate) credit_score: u16,
    /// Declared available liquidity
    #[arg(long, default_value_t = 120_000.0)]
    pub(crate) liquidity: f64,
    /// Target closing date (YYYY-MM-DD). Defaults to 45 days out.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) closing: Option<NaiveDate>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let closing = args
        .closing
        .unwrap_or_else(|| Local::now().date_naive() + Duration::days(45));

    let service = Arc::new(LoanWorkflowService::new(
        Arc::new(InMemoryLoanRepository::default()),
        Arc::new(InMemoryDocumentStore::default()),
        Arc::new(LogNotificationDispatcher),
        Arc::new(NullValuationProvider),
        UnderwritingRules::default(),
        ActionLinkCodec::new("lendflow-demo-secret"),
        Duration::days(3),
        lender_recipients(),
    ));

    println!("LendFlow workflow demo");
    println!("======================");

    let loan = service.submit_application(sample_application(args.amount, closing))?;
    println!(
        "submitted {} ({}) for {} at ${:.2}",
        loan.id,
        loan.loan_type.label(),
        loan.borrower.full_name(),
        loan.amount
    );

    for event in [
        "DOCUMENTS_REQUESTED",
        "REVIEW_STARTED",
        "UNDERWRITING_STARTED",
    ] {
        let outcome = service.advance_workflow_event(&loan.id, event)?;
        println!(
            "{event} -> {} ({} notification(s))",
            outcome.loan.current_stage.label(),
            outcome.notifications.len()
        );
    }

    let outcome =
        service.submit_underwriting_intake(&loan.id, intake(args.credit_score, args.liquidity))?;
    println!(
        "intake submitted ({} on file)",
        outcome.loan.intake.status.label()
    );

    let outcome = service.submit_conditions_form(
        &loan.id,
        conditions(args.credit_score, args.liquidity),
    )?;
    println!("conditions form accepted");

    if let Some(summary) = outcome.summary {
        println!();
        println!("quick decision: {}", summary.decision.label());
        for reason in &summary.reasons {
            println!("  - {reason}");
        }
        if !summary.flags.is_empty() {
            println!("open flags:");
            for flag in &summary.flags {
                println!("  [{:?}] {}", flag.severity, flag.label);
            }
        }
        println!(
            "liquidity: required {:.2}, available {:.2}",
            summary.liquidity.required, summary.liquidity.available
        );
    }

    Ok(())
}

fn upload(name: &str) -> SupportingDocument {
    SupportingDocument {
        name: name.to_string(),
        storage_key: format!("demo/{name}"),
        uploaded_at: chrono::Utc::now(),
    }
}

fn sample_application(amount: f64, closing: NaiveDate) -> NewLoanApplication {
    NewLoanApplication {
        borrower: BorrowerProfile {
            first_name: "Dana".to_string(),
            last_name: "Reyes".to_string(),
            email: "dana.reyes@example.com".to_string(),
            phone: Some("515-555-0147".to_string()),
            mailing_address: Some("900 Grand Ave, Des Moines, IA".to_string()),
            emergency_contacts: Vec::new(),
            guarantors: Vec::new(),
            guarantor_contacts: Vec::new(),
        },
        llc_name: Some("Linden Ave Holdings LLC".to_string()),
        llc_state: Some("IA".to_string()),
        amount,
        loan_type: LoanType::FixAndFlip,
        purchase: PurchaseDetails {
            property_address: Some("41 Linden Ave, Des Moines, IA".to_string()),
            purchase_price: Some(amount * 1.05),
            rehab_budget: Some(amount * 0.2),
            after_repair_value: Some(amount * 1.6),
            exit_strategy: Some("resale".to_string()),
            target_closing_date: Some(closing),
            comparable_sales: vec![upload("comps.pdf")],
            property_photos: vec![upload("front-elevation.jpg")],
            purchase_contract: vec![upload("contract.pdf")],
            scope_of_work: vec![upload("scope.pdf")],
        },
    }
}

fn intake(credit_score: u16, liquidity: f64) -> IntakeForm {
    IntakeForm {
        credit_score: Some(credit_score),
        liquidity_amount: Some(liquidity),
        has_external_loans: Some(false),
        external_loans: Vec::new(),
        declared_monthly_payment: None,
        notes: None,
    }
}

fn conditions(credit_score: u16, liquidity: f64) -> ConditionsSubmission {
    ConditionsSubmission {
        credit_score: Some(credit_score),
        liquidity_amount: Some(liquidity),
        liquidity_documents: vec![LiquidityDocument {
            category: LiquidityDocCategory::BankStatement,
            statement_name: "Dana Reyes".to_string(),
            evidence_key: "demo/bank-statement.pdf".to_string(),
            uploaded_at: chrono::Utc::now(),
            named_party_is_guarantor: false,
            named_party_is_llc_member: false,
        }],
        llc_documents: LlcDocumentKind::all()
            .into_iter()
            .map(|kind| LlcDocument {
                kind,
                name: format!("{}.pdf", kind.label().replace(' ', "-")),
                storage_key: format!("demo/llc/{}", kind.label().replace(' ', "-")),
                uploaded_at: chrono::Utc::now(),
            })
            .collect(),
        referral: Some(ReferralContact {
            name: "Marcus Webb".to_string(),
            email: "marcus@webbrealty.example.com".to_string(),
            phone: "515-555-0199".to_string(),
        }),
        past_projects: vec![PastProject {
            address: "12 Oakridge Dr, Ankeny, IA".to_string(),
            photos: vec![upload("oakridge-after.jpg")],
        }],
        other_mortgage_loan_count: Some(2),
        other_mortgage_total: Some(0.0),
        files: vec![UploadedFile {
            name: "bank-statement.pdf".to_string(),
            source_key: "demo/staging/bank-statement.pdf".to_string(),
        }],
        reuse_meta: None,
    }
}
