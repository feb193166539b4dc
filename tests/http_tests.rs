mod common;

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use mockito::{Matcher, Server};
use serde_json::json;

use common::{deepseek_config, delta_line, init_logger, openai_config};
use omniprompt::connectivity::AlwaysOnline;
use omniprompt::transport::ReqwestTransport;
use omniprompt::{Config, Error, OmniClient};

fn client(config: Config) -> OmniClient<ReqwestTransport, AlwaysOnline>
{   OmniClient::with_parts(config, ReqwestTransport::new(), AlwaysOnline)
}

#[tokio::test]
async fn openai_request_carries_bearer_token_and_payload()
{   init_logger();
    let mut server = Server::new_async().await;
    let mock = server
      .mock("POST", "/v1/chat/completions")
      .match_header("authorization", "Bearer sk-test-openai")
      .match_header("content-type", "application/json")
      .match_body(Matcher::Json(json!({
        "model": "gpt-4o-mini",
        "messages": [{ "role": "user", "content": "Explain der Hund" }],
        "temperature": 0.2,
        "max_tokens": 200
      })))
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"choices":[{"message":{"content":" hi "}}]}"#)
      .expect(1)
      .create_async()
      .await;

    let config = Config
    {   openai_endpoint: format!("{}/v1/chat/completions", server.url())
      , ..openai_config()
    };
    let text = client(config).complete("Explain der Hund", None).await;

    assert_eq!(text, Ok("hi".to_string()));
    mock.assert_async().await;
}

#[tokio::test]
async fn server_error_is_reported_once()
{   let mut server = Server::new_async().await;
    let mock = server
      .mock("POST", "/chat/completions")
      .with_status(500)
      .with_body("upstream exploded")
      .expect(1)
      .create_async()
      .await;

    let config = Config
    {   deepseek_endpoint: format!("{}/chat/completions", server.url())
      , ..deepseek_config(false)
    };
    let result = client(config).complete("x", None).await;

    assert_eq!(
      result,
      Err(Error::Api
      {   status: 500
        , message: "upstream exploded".to_string()
      })
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn empty_choices_is_empty_response()
{   let mut server = Server::new_async().await;
    let _mock = server
      .mock("POST", "/v1/chat/completions")
      .with_status(200)
      .with_body(r#"{"choices":[]}"#)
      .create_async()
      .await;

    let config = Config
    {   openai_endpoint: format!("{}/v1/chat/completions", server.url())
      , ..openai_config()
    };
    assert_eq!(
      client(config).complete("x", None).await,
      Err(Error::EmptyResponse)
    );
}

#[tokio::test]
async fn deepseek_stream_body_is_decoded_line_by_line()
{   let mut server = Server::new_async().await;
    let body = format!(
      "{}\n\n: keep-alive\n\n{}\n\ndata: [DONE]\n\n",
      delta_line("ab"), delta_line("cd")
    );
    let mock = server
      .mock("POST", "/chat/completions")
      .match_header("authorization", "Bearer sk-test-deepseek")
      .match_header("accept", "application/json")
      .match_body(Matcher::PartialJson(json!({
        "stream": true,
        "messages": [
          { "role": "system", "content": "You are a helpful assistant." },
          { "role": "user", "content": "stream please" }
        ]
      })))
      .with_status(200)
      .with_header("content-type", "text/event-stream")
      .with_body(body)
      .create_async()
      .await;

    let config = Config
    {   deepseek_endpoint: format!("{}/chat/completions", server.url())
      , ..deepseek_config(true)
    };
    let text = client(config).complete("stream please", None).await;

    assert_eq!(text, Ok("abcd".to_string()));
    mock.assert_async().await;
}

#[tokio::test]
async fn slow_steady_stream_outlives_the_request_timeout()
{   let mut server = Server::new_async().await;
    let _mock = server
      .mock("POST", "/chat/completions")
      .with_status(200)
      .with_header("content-type", "text/event-stream")
      .with_chunked_body(|w| {
        for part in ["a", "b", "c"]
        {   std::thread::sleep(Duration::from_millis(600));
            writeln!(w, "{}\n", delta_line(part))?;
            w.flush()?;
        }
        writeln!(w, "data: [DONE]")
      })
      .create_async()
      .await;

    // each gap is shorter than the timeout, the whole body is not
    let config = Config
    {   deepseek_endpoint: format!("{}/chat/completions", server.url())
      , request_timeout_secs: 1
      , retry_delay_secs: 0
      , ..deepseek_config(true)
    };
    let text = client(config).complete("slow", None).await;

    assert_eq!(text, Ok("abc".to_string()));
}

#[tokio::test]
async fn stalled_stream_times_out_between_chunks()
{   let mut server = Server::new_async().await;
    let _mock = server
      .mock("POST", "/chat/completions")
      .with_status(200)
      .with_chunked_body(|w| {
        writeln!(w, "{}\n", delta_line("a"))?;
        w.flush()?;
        std::thread::sleep(Duration::from_millis(1500));
        writeln!(w, "data: [DONE]")
      })
      .expect(3)
      .create_async()
      .await;

    let config = Config
    {   deepseek_endpoint: format!("{}/chat/completions", server.url())
      , request_timeout_secs: 1
      , retry_delay_secs: 0
      , ..deepseek_config(true)
    };
    let result = client(config).complete("stall", None).await;

    assert_eq!(result, Err(Error::TimeoutExhausted { attempts: 3 }));
}

#[tokio::test]
async fn refused_connection_is_a_transport_error()
{   let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
      .await
      .unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = Config
    {   openai_endpoint: format!("http://{}/v1/chat/completions", addr)
      , ..openai_config()
    };
    let result = client(config).complete("x", None).await;

    assert!(matches!(result, Err(Error::Transport(_))), "{:?}", result);
}

#[tokio::test]
async fn silent_server_exhausts_all_attempts()
{   let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
      .await
      .unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);
    tokio::spawn(async move {
      let mut open = Vec::new();
      while let Ok((socket, _)) = listener.accept().await
      {   counter.fetch_add(1, Ordering::SeqCst);
          open.push(socket);
      }
    });

    let config = Config
    {   openai_endpoint: format!("http://{}/v1/chat/completions", addr)
      , request_timeout_secs: 1
      , retry_delay_secs: 0
      , ..openai_config()
    };
    let result = client(config).complete("x", None).await;

    assert_eq!(result, Err(Error::TimeoutExhausted { attempts: 3 }));
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
}
