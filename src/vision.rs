use std::time::Duration;

use base64::Engine as _;
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;

use crate::imaging;
use crate::parser::ParseError;
use crate::settings::{Provider, VisionSettings};

/// Image bytes plus MIME type, sent inline to the model.
#[derive(Debug, Clone)]
pub struct ReceiptImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ReceiptImage {
    fn base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }
}

/// A hosted model that reads a receipt image and answers with JSON text.
pub trait VisionModel {
    fn extract_json(&self, image: &ReceiptImage, prompt: &str) -> Result<String, ParseError>;
}

pub struct HttpVisionModel {
    settings: VisionSettings,
    api_key: String,
    client: Client,
}

fn build_client(timeout_secs: Option<u64>) -> Result<Client, ParseError> {
    let mut builder = Client::builder();
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build().map_err(|e| ParseError::Request(e.to_string()))
}

fn check_status(resp: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, ParseError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body: String = resp.text().unwrap_or_default().chars().take(500).collect();
    Err(ParseError::Status {
        status: status.as_u16(),
        body,
    })
}

impl HttpVisionModel {
    pub fn from_settings(settings: &VisionSettings) -> Result<Self, ParseError> {
        let api_key = settings
            .api_key()
            .ok_or_else(|| ParseError::MissingApiKey(settings.api_key_env.clone()))?;
        Ok(Self {
            settings: settings.clone(),
            api_key,
            client: build_client(settings.timeout_secs)?,
        })
    }

    fn gemini(&self, image: &ReceiptImage, prompt: &str) -> Result<String, ParseError> {
        let body = gemini::request(&self.settings, image, prompt);
        let url = format!(
            "{}/models/{}:generateContent",
            self.settings.endpoint_base(),
            self.settings.model
        );
        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .map_err(|e| ParseError::Request(e.to_string()))?;
        let out: gemini::Response = check_status(resp)?
            .json()
            .map_err(|e| ParseError::Request(format!("decode gemini response: {e}")))?;
        gemini::text(out)
    }

    fn openai(&self, image: &ReceiptImage, prompt: &str) -> Result<String, ParseError> {
        let body = openai::request(&self.settings, image, prompt);
        let url = format!("{}/chat/completions", self.settings.endpoint_base());
        let resp = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .map_err(|e| ParseError::Request(e.to_string()))?;
        let out: openai::Response = check_status(resp)?
            .json()
            .map_err(|e| ParseError::Request(format!("decode openai response: {e}")))?;
        openai::text(out)
    }
}

fn non_blank(text: Option<String>) -> Result<String, ParseError> {
    text.filter(|t| !t.trim().is_empty())
        .ok_or(ParseError::EmptyResponse)
}

/// `generateContent` wire types.
mod gemini {
    use serde::{Deserialize, Serialize};

    use super::{non_blank, ReceiptImage};
    use crate::parser::ParseError;
    use crate::settings::VisionSettings;

    #[derive(Serialize)]
    pub(super) struct InlineData<'a> {
        mime_type: &'a str,
        data: String,
    }

    #[derive(Serialize)]
    #[serde(untagged)]
    pub(super) enum Part<'a> {
        Text { text: &'a str },
        Image { inline_data: InlineData<'a> },
    }

    #[derive(Serialize)]
    pub(super) struct Content<'a> {
        parts: Vec<Part<'a>>,
    }

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct GenerationConfig {
        temperature: f32,
        max_output_tokens: u32,
        response_mime_type: &'static str,
    }

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct Request<'a> {
        contents: Vec<Content<'a>>,
        generation_config: GenerationConfig,
    }

    #[derive(Deserialize)]
    pub(super) struct Response {
        #[serde(default)]
        candidates: Vec<Candidate>,
    }

    #[derive(Deserialize)]
    struct Candidate {
        content: Option<CandidateContent>,
    }

    #[derive(Deserialize)]
    struct CandidateContent {
        #[serde(default)]
        parts: Vec<ResponsePart>,
    }

    #[derive(Deserialize)]
    struct ResponsePart {
        text: Option<String>,
    }

    pub(super) fn request<'a>(
        settings: &VisionSettings,
        image: &'a ReceiptImage,
        prompt: &'a str,
    ) -> Request<'a> {
        Request {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: prompt },
                    Part::Image {
                        inline_data: InlineData {
                            mime_type: &image.mime_type,
                            data: image.base64(),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: settings.temperature,
                max_output_tokens: settings.max_output_tokens,
                response_mime_type: "application/json",
            },
        }
    }

    /// First text part of the first candidate.
    pub(super) fn text(resp: Response) -> Result<String, ParseError> {
        non_blank(
            resp.candidates
                .into_iter()
                .next()
                .and_then(|c| c.content)
                .and_then(|c| c.parts.into_iter().find_map(|p| p.text)),
        )
    }
}

/// Chat completions wire types.
mod openai {
    use serde::{Deserialize, Serialize};

    use super::{non_blank, ReceiptImage};
    use crate::parser::ParseError;
    use crate::settings::VisionSettings;

    pub(super) const USER_TEXT: &str = "Read the receipt and return the JSON.";

    #[derive(Serialize)]
    pub(super) struct ImageUrl {
        url: String,
    }

    #[derive(Serialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    pub(super) enum UserPart<'a> {
        Text { text: &'a str },
        ImageUrl { image_url: ImageUrl },
    }

    #[derive(Serialize)]
    #[serde(untagged)]
    pub(super) enum MessageContent<'a> {
        Plain(&'a str),
        Parts(Vec<UserPart<'a>>),
    }

    #[derive(Serialize)]
    pub(super) struct Message<'a> {
        role: &'static str,
        content: MessageContent<'a>,
    }

    #[derive(Serialize)]
    pub(super) struct ResponseFormat {
        #[serde(rename = "type")]
        kind: &'static str,
    }

    #[derive(Serialize)]
    pub(super) struct Request<'a> {
        model: &'a str,
        messages: Vec<Message<'a>>,
        response_format: ResponseFormat,
        temperature: f32,
        max_tokens: u32,
    }

    #[derive(Deserialize)]
    pub(super) struct Response {
        #[serde(default)]
        choices: Vec<Choice>,
    }

    #[derive(Deserialize)]
    struct Choice {
        message: ChoiceMessage,
    }

    #[derive(Deserialize)]
    struct ChoiceMessage {
        content: Option<String>,
    }

    pub(super) fn request<'a>(
        settings: &'a VisionSettings,
        image: &ReceiptImage,
        prompt: &'a str,
    ) -> Request<'a> {
        let data_url = format!("data:{};base64,{}", image.mime_type, image.base64());
        Request {
            model: &settings.model,
            messages: vec![
                Message {
                    role: "system",
                    content: MessageContent::Plain(prompt),
                },
                Message {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        UserPart::Text { text: USER_TEXT },
                        UserPart::ImageUrl {
                            image_url: ImageUrl { url: data_url },
                        },
                    ]),
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
            temperature: settings.temperature,
            max_tokens: settings.max_output_tokens,
        }
    }

    pub(super) fn text(resp: Response) -> Result<String, ParseError> {
        non_blank(resp.choices.into_iter().next().and_then(|c| c.message.content))
    }
}

impl VisionModel for HttpVisionModel {
    fn extract_json(&self, image: &ReceiptImage, prompt: &str) -> Result<String, ParseError> {
        tracing::info!(
            provider = ?self.settings.provider,
            model = %self.settings.model,
            bytes = image.bytes.len(),
            "sending receipt to vision model"
        );
        match self.settings.provider {
            Provider::Gemini => self.gemini(image, prompt),
            Provider::OpenAi => self.openai(image, prompt),
        }
    }
}

/// Download a remote receipt image and sniff its type.
pub fn fetch_image(url: &str, timeout_secs: Option<u64>) -> Result<ReceiptImage, ParseError> {
    let client = build_client(timeout_secs)?;
    let resp = client
        .get(url)
        .send()
        .map_err(|e| ParseError::ImageFetch(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(ParseError::ImageFetch(format!("{url} returned {status}")));
    }
    let bytes = resp
        .bytes()
        .map_err(|e| ParseError::ImageFetch(e.to_string()))?
        .to_vec();
    let format = imaging::detect_format(&bytes, url)
        .map_err(|_| ParseError::ImageFetch(format!("{url} is not a supported image")))?;
    Ok(ReceiptImage {
        bytes,
        mime_type: imaging::mime_type(format).to_string(),
    })
}
