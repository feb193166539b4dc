mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use common::{
  completion, deepseek_config, delta_line, init_logger, openai_config
, Offline, ScriptedTransport, Step
};
use omniprompt::connectivity::AlwaysOnline;
use omniprompt::redact::REDACTED;
use omniprompt::{Config, Error, OmniClient, ProgressFn, Provider};

fn client(config: Config, transport: &ScriptedTransport)
  -> OmniClient<ScriptedTransport, AlwaysOnline>
{   OmniClient::with_parts(config, transport.clone(), AlwaysOnline)
}

#[tokio::test(start_paused = true)]
async fn timeouts_back_off_two_then_four_seconds()
{   init_logger();
    let transport = ScriptedTransport::new(vec![
      Step::Timeout, Step::Timeout, Step::Timeout
    ]);
    let client = client(openai_config(), &transport);

    let start = Instant::now();
    let result = client.complete("hello", None).await;

    assert_eq!(result, Err(Error::TimeoutExhausted { attempts: 3 }));
    assert_eq!(
      transport.call_offsets(start),
      vec![
        Duration::ZERO
      , Duration::from_secs(2)
      , Duration::from_secs(6)
      ]
    );
    // no sleep after the last attempt
    assert_eq!(start.elapsed(), Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn timeout_then_success_returns_text()
{   let transport = ScriptedTransport::new(vec![
      Step::Timeout
    , Step::Body(completion("  Hund = dog \n"))
    ]);
    let client = client(openai_config(), &transport);

    let start = Instant::now();
    let text = client.complete("hello", None).await;

    assert_eq!(text, Ok("Hund = dog".to_string()));
    assert_eq!(transport.calls(), 2);
    assert_eq!(start.elapsed(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn retry_delay_follows_configuration()
{   let config = Config
    {   retry_delay_secs: 5
      , ..openai_config()
    };
    let transport = ScriptedTransport::new(vec![
      Step::Timeout, Step::Timeout, Step::Body(completion("ok"))
    ]);
    let client = client(config, &transport);

    let start = Instant::now();
    assert_eq!(client.complete("x", None).await, Ok("ok".to_string()));
    assert_eq!(
      transport.call_offsets(start),
      vec![
        Duration::ZERO
      , Duration::from_secs(5)
      , Duration::from_secs(15)
      ]
    );
}

#[tokio::test]
async fn non_timeout_failure_is_not_retried()
{   let transport = ScriptedTransport::new(vec![
      Step::Fail("connection refused".to_string())
    , Step::Body(completion("never reached"))
    ]);
    let client = client(openai_config(), &transport);

    let result = client.complete("hello", None).await;

    assert_eq!(
      result,
      Err(Error::Transport("connection refused".to_string()))
    );
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn error_status_is_not_retried_and_key_is_scrubbed()
{   let transport = ScriptedTransport::new(vec![
      Step::Status(401, "Incorrect API key provided: sk-test-openai".to_string())
    ]);
    let client = client(openai_config(), &transport);

    let result = client.complete("hello", None).await;

    assert_eq!(
      result,
      Err(Error::Api
      {   status: 401
        , message: format!("Incorrect API key provided: {}", REDACTED)
      })
    );
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn offline_probe_prevents_any_call()
{   let transport = ScriptedTransport::new(vec![
      Step::Body(completion("unused"))
    ]);
    let client = OmniClient::with_parts(
      openai_config(), transport.clone(), Offline
    );

    assert_eq!(client.complete("hello", None).await, Err(Error::NoInternet));
    assert_eq!(client.complete_text("hello").await, "[Error: No internet]");
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn response_shapes_map_to_distinct_errors()
{   let transport = ScriptedTransport::new(vec![
      Step::Body(r#"{"choices":[{"message":{"content":" hi "}}]}"#.to_string())
    , Step::Body(r#"{"choices":[]}"#.to_string())
    , Step::Body(r#"{"object":"error"}"#.to_string())
    ]);
    let client = client(openai_config(), &transport);

    assert_eq!(client.complete("a", None).await, Ok("hi".to_string()));
    assert_eq!(client.complete("b", None).await, Err(Error::EmptyResponse));
    assert!(matches!(
      client.complete("c", None).await,
      Err(Error::MalformedResponse(_))
    ));
}

#[tokio::test]
async fn missing_model_fails_before_any_call()
{   let config = Config
    {   deepseek_model: String::new()
      , ..deepseek_config(false)
    };
    let transport = ScriptedTransport::new(vec![]);
    let client = client(config, &transport);

    assert_eq!(
      client.complete("x", None).await,
      Err(Error::MissingModel(Provider::DeepSeek))
    );
    assert_eq!(
      client.complete_text("x").await,
      "[Error: No DeepSeek model selected]"
    );
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn deepseek_stream_accumulates_deltas()
{   let transport = ScriptedTransport::new(vec![Step::Lines(vec![
      delta_line("ab")
    , String::new()
    , ": keep-alive".to_string()
    , "data: {broken".to_string()
    , delta_line("cd")
    , "data: [DONE]".to_string()
    ])]);
    let client = client(deepseek_config(true), &transport);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let progress: ProgressFn = Arc::new(move |p| sink.lock().unwrap().push(p));

    let text = client.complete("stream me", Some(progress)).await;

    assert_eq!(text, Ok("abcd".to_string()));
    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert!(seen.iter().all(|p| *p < 100));

    let request = &transport.requests()[0];
    assert!(request.is_streaming());
    assert_eq!(request.body.messages.len(), 2);
}

#[tokio::test]
async fn empty_stream_is_its_own_error()
{   let transport = ScriptedTransport::new(vec![Step::Lines(vec![
      ": keep-alive".to_string()
    , "data: [DONE]".to_string()
    ])]);
    let client = client(deepseek_config(true), &transport);

    assert_eq!(
      client.complete("x", None).await,
      Err(Error::EmptyStreamedResponse)
    );
}

#[tokio::test]
async fn whitespace_only_stream_is_not_a_result()
{   let transport = ScriptedTransport::new(vec![Step::Lines(vec![
      delta_line("  ")
    , delta_line("\n")
    , "data: [DONE]".to_string()
    ])]);
    let client = client(deepseek_config(true), &transport);

    assert_eq!(
      client.complete("x", None).await,
      Err(Error::EmptyStreamedResponse)
    );
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn stream_retry_discards_partial_text()
{   let transport = ScriptedTransport::new(vec![
      Step::Timeout
    , Step::Lines(vec![delta_line("whole"), delta_line(" answer")])
    ]);
    let client = client(deepseek_config(true), &transport);

    assert_eq!(
      client.complete("x", None).await,
      Ok("whole answer".to_string())
    );
    assert_eq!(transport.calls(), 2);
}
