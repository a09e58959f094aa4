use chrono::{NaiveDate, Utc};
use clap::Args;
use moveleads::config::MarketplaceConfig;
use moveleads::error::AppError;
use moveleads::marketplace::pricing::quote_with_rule;
use moveleads::marketplace::{
    CompanyProfile, CompanyStatus, ContactDetails, CreditOutcome, InMemoryMarketplaceStore,
    LeadSubmission, Marketplace, Notification, PaymentCompleted, PricingRule, PropertySize,
    RecordingSink, RevealRequest, ServiceFlags,
};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct QuoteArgs {
    /// Postcode the household is moving from
    #[arg(long)]
    pub(crate) from: String,
    /// Postcode the household is moving to
    #[arg(long)]
    pub(crate) to: String,
    /// Property size label (studio, 1_bed ... 5_plus_bed)
    #[arg(long, value_parser = crate::infra::parse_property_size)]
    pub(crate) size: PropertySize,
    /// Move date (YYYY-MM-DD). Omit for flexible dates.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) move_date: Option<NaiveDate>,
    /// Override the pricing date (defaults to today).
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Credits bought by the demo company before revealing
    #[arg(long, default_value_t = 20)]
    pub(crate) credits: u32,
    /// Property size of the demo lead
    #[arg(long, default_value = "2_bed", value_parser = crate::infra::parse_property_size)]
    pub(crate) size: PropertySize,
    /// Move date for the demo lead (YYYY-MM-DD). Omit for flexible dates.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) move_date: Option<NaiveDate>,
}

pub(crate) fn run_quote(args: QuoteArgs) -> Result<(), AppError> {
    let QuoteArgs {
        from,
        to,
        size,
        move_date,
        today,
    } = args;

    let today = today.unwrap_or_else(|| Utc::now().date_naive());
    let rule = PricingRule::fallback();
    let quote = quote_with_rule(&rule, &from, &to, size, move_date, today);

    println!("Lead price quote ({})", rule.name);
    println!("- {} -> {} | {}", from, to, size.label());
    println!(
        "- Distance band: {} | short notice: {}",
        quote.distance_band.label(),
        if quote.short_notice { "yes" } else { "no" }
    );
    match move_date {
        Some(date) => println!("- Move date {} (priced on {})", date, today),
        None => println!("- Flexible move date"),
    }
    println!("Reveal price: {} credits", quote.price);

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        credits,
        size,
        move_date,
    } = args;

    let now = Utc::now();
    let store = Arc::new(InMemoryMarketplaceStore::new());
    let sink = Arc::new(RecordingSink::default());
    let marketplace = Marketplace::new(store, sink.clone(), &MarketplaceConfig::default());

    println!("Lead marketplace demo (in-memory store)");
    let companies = [
        ("Thames Removals", "jobs@thames.example", ["SW1A", "SW"]),
        ("Capital Van Lines", "desk@capitalvans.example", ["SW", "SE"]),
    ];
    for (name, email, prefixes) in companies {
        let company = marketplace.companies.register(
            CompanyProfile {
                name: name.to_string(),
                email: email.to_string(),
                phone: None,
                website: None,
            },
            now,
        )?;
        marketplace
            .companies
            .review(&company.id, CompanyStatus::Approved)?;
        let prefixes: Vec<String> = prefixes.iter().map(|prefix| prefix.to_string()).collect();
        let coverage = marketplace.companies.replace_coverage(&company.id, &prefixes)?;
        println!(
            "- Approved {} ({}) covering {}",
            name,
            company.id,
            coverage
                .iter()
                .map(|entry| entry.prefix.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let receipt = marketplace.intake.submit(
        "demo-cli",
        LeadSubmission {
            from_postcode: "SW1A 2AA".to_string(),
            to_postcode: "SE10 8XJ".to_string(),
            move_date,
            flexible_dates: move_date.is_none(),
            property_size: size,
            services: ServiceFlags {
                packing: true,
                ..ServiceFlags::default()
            },
            notes: Some("Piano on the ground floor".to_string()),
            contact: ContactDetails {
                full_name: "Priya Shah".to_string(),
                email: "priya.shah@example.net".to_string(),
                phone: "07700 900123".to_string(),
                marketing_consent: false,
            },
        },
        now,
    )?;
    println!(
        "\nLead {} matched {} compan{}",
        receipt.lead_id,
        receipt.assignments.len(),
        if receipt.assignments.len() == 1 { "y" } else { "ies" }
    );
    for assignment in &receipt.assignments {
        println!("  - {} -> {}", assignment.id, assignment.company_id);
    }

    let Some(assignment) = receipt.assignments.first() else {
        println!("No company covers the lead; nothing to reveal.");
        return Ok(());
    };

    let payment = PaymentCompleted {
        company_id: assignment.company_id.clone(),
        credits,
        session_id: "cs_demo_0001".to_string(),
    };
    for attempt in ["checkout", "webhook replay"] {
        match marketplace.ledger.credit_purchase(&payment, now)? {
            CreditOutcome::Applied(entry) => println!(
                "\n{}: credited {} (balance {})",
                attempt, entry.delta, entry.balance_after
            ),
            CreditOutcome::AlreadyProcessed(entry) => println!(
                "{}: already processed as {}",
                attempt, entry.id
            ),
        }
    }

    let request = RevealRequest {
        lead_id: receipt.lead_id.clone(),
        assignment_id: assignment.id.clone(),
        requesting_company_id: assignment.company_id.clone(),
    };
    for attempt in ["first reveal", "second reveal"] {
        let outcome = marketplace.reveal.reveal(&request, now)?;
        println!(
            "{}: {} <{}> {} | charged {} | price {}",
            attempt,
            outcome.contact.full_name,
            outcome.contact.email,
            outcome.contact.phone,
            if outcome.charged { "yes" } else { "no" },
            outcome
                .assignment
                .price_at_reveal
                .map(|price| price.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }

    println!("\nLedger for {}", assignment.company_id);
    for entry in marketplace.ledger.history(&assignment.company_id)? {
        println!(
            "  - {:<10} {:>7} -> {:>7}  {}",
            entry.reason.label(),
            entry.delta,
            entry.balance_after,
            entry.description
        );
    }

    println!("\nNotifications dispatched");
    for event in sink.events() {
        match event {
            Notification::LeadAssigned {
                company_id,
                assignment_id,
                ..
            } => println!("  - lead_assigned: {} ({})", company_id, assignment_id),
            Notification::LowBalance(low) => println!(
                "  - low_balance: {} <{}> at {}",
                low.company_name, low.company_email, low.new_balance
            ),
        }
    }

    Ok(())
}
