use health_turn_orchestrator::{
    agent::{OrchestratorConfig, TurnOrchestrator},
    memory::{ContextSummarizer, MemoryCompactor},
    models::TurnRequest,
    oracle::{last_user_content, MockOracle, OracleMessage, OracleTask},
    state::InMemoryStateStore,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// The user message is quoted at the end of the classification and
/// extraction prompts
fn quoted_message(messages: &[OracleMessage]) -> String {
    let prompt = last_user_content(messages).unwrap_or_default();
    prompt
        .rsplit("User message:\n\"")
        .next()
        .unwrap_or_default()
        .trim_end_matches('"')
        .to_lowercase()
}

fn scripted_oracle() -> MockOracle {
    MockOracle::new(|task, messages| {
        let text = quoted_message(messages);
        let response = match task {
            OracleTask::Classification => {
                let label = if text.contains("diet") || text.contains("meal") {
                    "diet"
                } else if text.contains("tablet") || text.contains("medicine") {
                    "medical"
                } else if text.contains("hair") {
                    "lifestyle"
                } else {
                    "off_topic"
                };
                label.to_string()
            }
            OracleTask::Extraction => match text.as_str() {
                "i'm 27" => r#"{"age": 27}"#.to_string(),
                "around 165 cm" => r#"{"height_cm": 165}"#.to_string(),
                "veg, mostly sitting at a desk" => {
                    r#"{"diet_type": "veg", "activity_level": "sedentary"}"#.to_string()
                }
                "want to lose some fat" => r#"{"goal": "fat_loss"}"#.to_string(),
                _ => "{}".to_string(),
            },
            OracleTask::Summarization => "User is working on a diet plan.".to_string(),
            OracleTask::Generation => "Start with dal, sabzi and two rotis for lunch, \
                and add a 20 minute walk after dinner."
                .to_string(),
        };
        Some(response)
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    info!("Health Turn Orchestrator demo starting");

    // Create components
    let oracle = Arc::new(scripted_oracle());
    let compactor = MemoryCompactor::new(ContextSummarizer::new(oracle.clone()));
    let orchestrator = TurnOrchestrator::new(
        Arc::new(InMemoryStateStore::new()),
        oracle,
        compactor,
        OrchestratorConfig::default(),
    );

    let script = [
        "Can you make me a diet plan?",
        "I'm 27",
        "around 165 cm",
        "veg, mostly sitting at a desk",
        "want to lose some fat",
        "Which tablet should I take for acidity?",
        "Which medicine then?",
    ];

    println!("\n=== DEMO CONVERSATION ===");
    for message in script {
        let reply = orchestrator
            .handle_turn(TurnRequest {
                user_id: "demo-user".to_string(),
                message: message.to_string(),
            })
            .await?;

        println!("\nuser: {}", message);
        println!("assistant [{:?}]: {}", reply.disposition, reply.reply);
    }

    Ok(())
}
