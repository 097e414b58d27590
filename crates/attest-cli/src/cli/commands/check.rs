use super::super::args::{CheckArgs, OutputFormat};
use crate::exit_codes::{CRITERION_FAILED, SUCCESS};
use anyhow::Context;
use attest_core::assert::LlmAssert;
use attest_core::model::AssertOptions;
use attest_core::providers::llm::fake::FakeClient;
use attest_core::providers::llm::LlmClient;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

pub async fn run(args: CheckArgs) -> anyhow::Result<i32> {
    let content = read_content(&args).await?;

    let mut extra = serde_json::Map::new();
    if let Some(temperature) = args.temperature {
        extra.insert("temperature".to_string(), serde_json::json!(temperature));
    }
    if let Some(max_tokens) = args.max_tokens {
        extra.insert("max_tokens".to_string(), serde_json::json!(max_tokens));
    }

    let mut checker = LlmAssert::new(AssertOptions {
        model: args.model.clone(),
        api_key: args.api_key.clone(),
        api_base: args.api_base.clone(),
        extra,
    });
    if let Some(prompt) = &args.system_prompt {
        checker.set_system_prompt(prompt.clone());
    }
    if let Some(fake) = fake_client(&args.model) {
        checker = checker.with_client(fake);
    }

    let result = checker.evaluate(&content, &args.criterion).await?;

    match args.format {
        OutputFormat::Text => println!("{result}"),
        OutputFormat::Json => {
            let report = serde_json::json!({
                "passed": result.passed,
                "criterion": result.criterion,
                "reasoning": result.reasoning,
                "content_preview": result.content_preview,
                "model": args.model,
                "call": checker.last_call(),
                "evaluated_at": chrono::Utc::now().to_rfc3339(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if result.passed {
        Ok(SUCCESS)
    } else {
        Ok(CRITERION_FAILED)
    }
}

async fn read_content(args: &CheckArgs) -> anyhow::Result<String> {
    if args.stdin {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("reading content from stdin")?;
        return Ok(buf);
    }
    args.content
        .clone()
        .ok_or_else(|| anyhow::anyhow!("missing content argument (or pass --stdin)"))
}

/// Models under the fake/ prefix run offline: fake/pass always passes,
/// anything else fails.
fn fake_client(model: &str) -> Option<Arc<dyn LlmClient>> {
    let name = model.strip_prefix("fake/")?;
    let reply = if name == "pass" {
        r#"{"result": "PASS", "reasoning": "scripted offline verdict"}"#
    } else {
        r#"{"result": "FAIL", "reasoning": "scripted offline verdict"}"#
    };
    Some(Arc::new(
        FakeClient::new(model.to_string()).with_reply(reply.to_string()),
    ))
}
