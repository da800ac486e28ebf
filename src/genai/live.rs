use super::{inline_data, publisher_model, save_file};
use crate::gcp::client::GcpClient;
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::io::{Cursor, Write};
use std::path::Path;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

const STRUCTURED_OUTPUT_MODEL: &str = "google/gemini-2.0-flash-001";
const LIVE_AUDIO_MODEL: &str = "gemini-live-2.5-flash-preview-native-audio-09-2025";
const LIVE_PATH: &str = "/ws/google.cloud.aiplatform.v1beta1.LlmBidiService/BidiGenerateContent";

/// Sample rate of the audio the Live API speaks back with
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// Event the structured output snippet asks the model to extract.
///
/// Missing or `null` fields decode to their empty value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarEvent {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(deserialize_with = "null_as_default")]
    pub participants: Vec<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Extract a [`CalendarEvent`] through the OpenAI-compatible chat endpoint.
///
/// Returns `None` when the model answers with something that is not the
/// expected JSON; the raw text is printed instead.
pub async fn generate_structured_output_with_txt(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
) -> Result<Option<CalendarEvent>> {
    let url = client.aiplatform_url(
        location,
        "v1",
        &format!(
            "projects/{}/locations/{}/endpoints/openapi/chat/completions",
            project, location
        ),
    );
    let body = json!({
        "model": STRUCTURED_OUTPUT_MODEL,
        "messages": [
            { "role": "system", "content": "Extract the event information." },
            { "role": "user", "content": "Alice and Bob are going to a science fair on Friday." },
        ],
        "response_format": { "type": "json_object" },
    });

    let response = client
        .post(&url, Some(&body))
        .await
        .context("generate content failed")?;

    let text = response
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    if text.is_empty() {
        anyhow::bail!("empty response text");
    }

    match serde_json::from_str::<CalendarEvent>(text) {
        Ok(event) => {
            writeln!(w, "Parsed struct: {:?}", event)?;
            Ok(Some(event))
        }
        Err(_) => {
            writeln!(w, "Model output was not valid JSON. Raw output:")?;
            writeln!(w, "{}", text)?;
            Ok(None)
        }
    }
}

/// 16-bit PCM samples of a WAV file as little-endian bytes, with their MIME type
pub fn load_audio_as_pcm_bytes(path: &Path) -> Result<(Vec<u8>, String)> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to open WAV file {}", path.display()))?;
    let spec = reader.spec();

    let mut data = Vec::with_capacity(reader.len() as usize * 2);
    for sample in reader.into_samples::<i16>() {
        let sample = sample.context("failed to decode WAV")?;
        data.extend_from_slice(&sample.to_le_bytes());
    }

    Ok((data, format!("audio/pcm;rate={}", spec.sample_rate)))
}

/// Concatenate PCM frames into a mono 16-bit WAV file
pub fn save_audio_frames_as_wav(path: &Path, frames: &[Vec<u8>], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut buffer, spec).context("failed to create WAV writer")?;
        for chunk in frames.concat().chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))
                .context("failed to write audio data")?;
        }
        writer.finalize().context("failed to finalize WAV file")?;
    }

    save_file(path, &buffer.into_inner())
}

fn live_setup_message(project: &str, location: &str) -> Value {
    json!({
        "setup": {
            "model": publisher_model(project, location, LIVE_AUDIO_MODEL),
            "generationConfig": { "responseModalities": ["AUDIO"] },
            "inputAudioTranscription": {},
            "outputAudioTranscription": {},
        }
    })
}

/// JSON payload of a server frame; the service sends JSON in binary frames too
fn decode_frame(message: Message) -> Result<Option<Value>> {
    let payload = match message {
        Message::Text(text) => text.into_bytes(),
        Message::Binary(bytes) => bytes,
        Message::Close(frame) => {
            debug!("Live session closed: {:?}", frame);
            return Ok(None);
        }
        _ => return Ok(Some(Value::Null)),
    };
    let value = serde_json::from_slice(&payload).context("malformed Live API message")?;
    Ok(Some(value))
}

/// Stream a WAV file to a Live model and save its spoken answer.
///
/// Returns the number of audio frames received.
pub async fn generate_live_audio_conversation(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    audio_path: &Path,
    output_path: &Path,
) -> Result<usize> {
    let (audio, mime_type) = load_audio_as_pcm_bytes(audio_path).context("failed to load audio")?;

    let url = format!("{}{}", client.endpoints.aiplatform_ws_host(location), LIVE_PATH);
    let token = client.get_token().await?;

    let mut request = url
        .as_str()
        .into_client_request()
        .context("invalid Live API URL")?;
    request.headers_mut().insert(
        "Authorization",
        HeaderValue::from_str(&format!("Bearer {}", token)).context("invalid access token")?,
    );

    debug!("Connecting to Live API: {}", url);
    let (stream, _) = tokio_tungstenite::connect_async(request)
        .await
        .context("failed to connect live")?;
    let (mut write, mut read) = stream.split();

    write
        .send(Message::Text(live_setup_message(project, location).to_string()))
        .await
        .context("failed to send setup")?;

    loop {
        let message = read
            .next()
            .await
            .context("Live session closed before setup completed")?
            .context("error receiving response")?;
        match decode_frame(message)? {
            Some(frame) if frame.get("setupComplete").is_some() => break,
            Some(_) => continue,
            None => anyhow::bail!("Live session closed before setup completed"),
        }
    }

    writeln!(w, "> Streaming audio from {} to the model\n", audio_path.display())?;

    let realtime_input = json!({
        "realtimeInput": {
            "mediaChunks": [{ "mimeType": mime_type, "data": STANDARD.encode(&audio) }],
        }
    });
    write
        .send(Message::Text(realtime_input.to_string()))
        .await
        .context("failed to send realtime input")?;

    let mut frames: Vec<Vec<u8>> = Vec::new();
    while let Some(message) = read.next().await {
        let message = message.context("error receiving response")?;
        let Some(frame) = decode_frame(message)? else {
            break;
        };
        let Some(content) = frame.get("serverContent") else {
            continue;
        };

        if let Some(text) = content.pointer("/inputTranscription/text").and_then(|v| v.as_str()) {
            writeln!(w, "Input transcription: {}", text)?;
        }
        if let Some(text) = content.pointer("/outputTranscription/text").and_then(|v| v.as_str()) {
            writeln!(w, "Output transcription: {}", text)?;
        }
        if let Some(parts) = content.pointer("/modelTurn/parts").and_then(|v| v.as_array()) {
            for part in parts {
                if let Some(data) = inline_data(part)? {
                    frames.push(data);
                }
            }
        }
        if content.get("turnComplete").and_then(|v| v.as_bool()) == Some(true) {
            break;
        }
    }

    if let Err(e) = write.send(Message::Close(None)).await {
        warn!("Failed to close Live session: {}", e);
    }

    if !frames.is_empty() {
        save_audio_frames_as_wav(output_path, &frames, OUTPUT_SAMPLE_RATE)
            .context("failed to write WAV")?;
        info!("Saved {} audio frames", frames.len());
        writeln!(w, "Model response saved to {}", output_path.display())?;
    }
    Ok(frames.len())
}
