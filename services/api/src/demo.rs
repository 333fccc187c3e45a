use crate::infra::{ChannelSubscriptionGate, InMemoryDiagnosticRepository, ManagerChatNotifier};
use clap::{Args, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use teremok::diagnostics::notifications::describe_outcome;
use teremok::diagnostics::{
    score_formula, score_rsp, score_typology, Catalogs, DiagnosticOutcome, DiagnosticService,
    FormulaSubmission, Lead, LikertAnswer, Product, ResultFilter, RspSubmission, TallyAnswer,
    TypologyAnswers, TypologySubmission, UserId, LEAD_STATUS_NEW,
};
use teremok::error::AppError;

#[derive(Subcommand, Debug)]
pub(crate) enum ScoreCommand {
    /// Weighted archetype quiz; answers as question=option pairs, e.g. 1=0,2=3
    Typology(ScoreArgs),
    /// Ten-question reliability formula; answers as values 1..4
    Formula(ScoreArgs),
    /// Result/status/process motivation quiz; answers as codes
    Rsp(ScoreArgs),
}

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Answers, comma separated or repeated
    #[arg(value_delimiter = ',', allow_hyphen_values = true, required = true)]
    pub(crate) answers: Vec<String>,
    /// Directory with catalog overrides
    #[arg(long)]
    pub(crate) catalog_dir: Option<PathBuf>,
    /// Print the outcome as JSON instead of text
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct CatalogArgs {
    /// typology, formula or rsp
    pub(crate) product: String,
    /// Directory with catalog overrides
    #[arg(long)]
    pub(crate) catalog_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Directory with catalog overrides
    #[arg(long)]
    pub(crate) catalog_dir: Option<PathBuf>,
    /// Channel users must join before starting a diagnostic
    #[arg(long, default_value = "@teremok_hr")]
    pub(crate) channel: String,
    /// Skip the CSV export at the end of the demo
    #[arg(long)]
    pub(crate) skip_export: bool,
}

pub(crate) fn run_score(command: ScoreCommand) -> Result<(), AppError> {
    let (args, outcome, catalogs) = match command {
        ScoreCommand::Typology(args) => {
            let catalogs = Catalogs::load(args.catalog_dir.as_deref())?;
            let answers = parse_typology_answers(&args.answers)?;
            let outcome = DiagnosticOutcome::Typology(score_typology(&catalogs.typology, &answers));
            (args, outcome, catalogs)
        }
        ScoreCommand::Formula(args) => {
            let catalogs = Catalogs::load(args.catalog_dir.as_deref())?;
            let answers = parse_likert_answers(&args.answers);
            let outcome = DiagnosticOutcome::Formula(score_formula(&catalogs.formula, &answers));
            (args, outcome, catalogs)
        }
        ScoreCommand::Rsp(args) => {
            let catalogs = Catalogs::load(args.catalog_dir.as_deref())?;
            let answers: Vec<TallyAnswer> = args
                .answers
                .iter()
                .map(|raw| TallyAnswer::from(raw.as_str()))
                .collect();
            let outcome = DiagnosticOutcome::Rsp(score_rsp(&answers));
            (args, outcome, catalogs)
        }
    };

    if args.json {
        let rendered = serde_json::to_string_pretty(&outcome).map_err(std::io::Error::from)?;
        println!("{rendered}");
    } else {
        render_outcome(&outcome, &catalogs);
    }
    Ok(())
}

pub(crate) fn run_catalog(args: CatalogArgs) -> Result<(), AppError> {
    let product: Product = args.product.parse().map_err(AppError::Input)?;
    let catalogs = Catalogs::load(args.catalog_dir.as_deref())?;

    let rendered = match product {
        Product::Typology => serde_json::to_string_pretty(&catalogs.typology),
        Product::Formula => serde_json::to_string_pretty(&catalogs.formula),
        Product::Rsp => serde_json::to_string_pretty(&catalogs.rsp),
    }
    .map_err(std::io::Error::from)?;

    println!("{rendered}");
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        catalog_dir,
        channel,
        skip_export,
    } = args;

    let catalogs = Arc::new(Catalogs::load(catalog_dir.as_deref())?);
    let repository = Arc::new(InMemoryDiagnosticRepository::default());
    let notifier = Arc::new(ManagerChatNotifier::new(Some(-1001)));
    let gate = Arc::new(ChannelSubscriptionGate::new(channel.clone()));
    let service = DiagnosticService::new(catalogs.clone(), repository, notifier.clone())
        .with_access_gate(gate.clone());

    let user = UserId(424_242);
    println!("Teremok diagnostics demo");

    let typology = TypologySubmission {
        user_id: Some(user),
        answers: [(1, 3), (2, 3), (3, 2), (4, 2), (5, 1)]
            .into_iter()
            .collect::<TypologyAnswers>()
            .into(),
    };
    match service.submit_typology(typology.clone()) {
        Ok(_) => println!("- Access gate unexpectedly open for {channel}"),
        Err(err) => println!("- Before subscribing to {channel}: {err}"),
    }

    gate.record_subscription(user);
    println!("- User {user} subscribed to {channel}");

    let submissions = [
        service.submit_typology(typology),
        service.submit_formula(FormulaSubmission {
            user_id: Some(user),
            answers: parse_likert_answers(&["4", "3", "4", "2", "3", "4", "3", "3", "2", "4"]),
        }),
        service.submit_rsp(RspSubmission {
            user_id: Some(user),
            answers: ["result", "status", "result", "process", "status", "status"]
                .into_iter()
                .map(TallyAnswer::from)
                .collect(),
        }),
    ];

    for submission in submissions {
        match submission {
            Ok(receipt) => {
                println!(
                    "\n{} (notified: {})",
                    receipt.product.display_name(),
                    receipt.notified
                );
                render_outcome(&receipt.outcome, &catalogs);
            }
            Err(err) => println!("  Submission rejected: {err}"),
        }
    }

    let lead = Lead {
        user_id: user,
        name: "Анна".to_string(),
        role: Some("Руководитель отдела продаж".to_string()),
        company: Some("Теремок Групп".to_string()),
        team_size: Some("12".to_string()),
        contact: "+7 900 123-45-67".to_string(),
        username: Some("@anna_sales".to_string()),
        request: Some("Нужна диагностика команды перед наймом".to_string()),
        source: "cli".to_string(),
        status: LEAD_STATUS_NEW.to_string(),
        notes: None,
    };
    if let Err(err) = service.submit_lead(lead) {
        println!("  Lead rejected: {err}");
    }

    println!("\nOperator chat outbox");
    for message in notifier.delivered() {
        println!("--- {:?}\n{}", message.kind, message.text);
    }

    let statistics = service.statistics(&ResultFilter::default())?;
    println!(
        "\nStatistics: {} results, {} leads",
        statistics.total, statistics.leads
    );
    for (product, primaries) in &statistics.by_primary {
        for (primary, count) in primaries {
            println!("  {}: {primary} × {count}", product.display_name());
        }
    }

    if skip_export {
        return Ok(());
    }

    println!("\nCSV export");
    let rows = service.export_results(&ResultFilter::default(), std::io::stdout().lock())?;
    println!("({rows} rows)");

    Ok(())
}

fn render_outcome(outcome: &DiagnosticOutcome, catalogs: &Catalogs) {
    let label = describe_outcome(outcome, catalogs);
    println!("  Результат: {}", label.text());

    match outcome {
        DiagnosticOutcome::Typology(typology) => {
            if let Some(category) = catalogs.typology.category(&typology.primary) {
                println!("  {}", category.short_description);
                if !category.advice.is_empty() {
                    println!("  Совет: {}", category.advice);
                }
            }
            for (key, points) in typology.scores.iter() {
                println!("    - {key}: {points}");
            }
        }
        DiagnosticOutcome::Formula(formula) => {
            println!("  Сумма баллов: {}", formula.total);
            println!("  {}", formula.description);
            if formula.out_of_range > 0 {
                println!("  Ответов вне шкалы 1..4: {}", formula.out_of_range);
            }
        }
        DiagnosticOutcome::Rsp(rsp) => {
            for (code, count) in &rsp.scores {
                println!("    - {code}: {count}");
            }
            if let Some(category) = catalogs.rsp.category(rsp.primary) {
                for recommendation in &category.recommendations {
                    println!("  • {recommendation}");
                }
            }
        }
    }

    if outcome.skipped() > 0 {
        println!("  Пропущено ответов: {}", outcome.skipped());
    }
}

/// Parses `question=option` pairs (`:` is accepted as well).
fn parse_typology_answers(raw: &[String]) -> Result<TypologyAnswers, AppError> {
    raw.iter()
        .map(|pair| {
            let (question, option) = pair
                .split_once('=')
                .or_else(|| pair.split_once(':'))
                .ok_or_else(|| AppError::Input(format!("expected question=option, got '{pair}'")))?;
            let question = question
                .trim()
                .parse::<u32>()
                .map_err(|_| AppError::Input(format!("question id '{question}' is not a number")))?;
            let option = option
                .trim()
                .parse::<i64>()
                .map_err(|_| AppError::Input(format!("option '{option}' is not an integer")))?;
            Ok((question, option))
        })
        .collect()
}

/// Non-integer tokens are kept so the scorer can report them as skipped.
fn parse_likert_answers<S: AsRef<str>>(raw: &[S]) -> Vec<LikertAnswer> {
    raw.iter()
        .map(|token| {
            let token = token.as_ref().trim();
            match token.parse::<i64>() {
                Ok(value) => LikertAnswer::from(value),
                Err(_) => LikertAnswer::Other(Value::String(token.to_string())),
            }
        })
        .collect()
}
