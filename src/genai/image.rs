use super::{generate_content, inline_data, publisher_model, save_file};
use crate::gcp::client::{str_field, GcpClient};
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const IMAGEN_GENERATE_MODEL: &str = "imagen-4.0-generate-001";
const IMAGEN_CAPABILITY_MODEL: &str = "imagen-3.0-capability-001";
const GEMINI_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

/// Reference images accepted by the Imagen capability model
#[derive(Debug, Clone)]
pub enum ReferenceImage {
    Raw {
        id: u32,
        gcs_uri: String,
    },
    Style {
        id: u32,
        gcs_uri: String,
        description: String,
    },
    Control {
        id: u32,
        gcs_uri: String,
        control_type: ControlType,
    },
    Subject {
        id: u32,
        gcs_uri: String,
        subject_type: String,
        description: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlType {
    Canny,
    Scribble,
    FaceMesh,
}

impl ControlType {
    fn as_str(&self) -> &'static str {
        match self {
            ControlType::Canny => "CONTROL_TYPE_CANNY",
            ControlType::Scribble => "CONTROL_TYPE_SCRIBBLE",
            ControlType::FaceMesh => "CONTROL_TYPE_FACE_MESH",
        }
    }
}

impl ReferenceImage {
    pub fn to_json(&self) -> Value {
        match self {
            ReferenceImage::Raw { id, gcs_uri } => json!({
                "referenceType": "REFERENCE_TYPE_RAW",
                "referenceId": id,
                "referenceImage": { "gcsUri": gcs_uri },
            }),
            ReferenceImage::Style { id, gcs_uri, description } => json!({
                "referenceType": "REFERENCE_TYPE_STYLE",
                "referenceId": id,
                "referenceImage": { "gcsUri": gcs_uri },
                "styleImageConfig": { "styleDescription": description },
            }),
            ReferenceImage::Control { id, gcs_uri, control_type } => json!({
                "referenceType": "REFERENCE_TYPE_CONTROL",
                "referenceId": id,
                "referenceImage": { "gcsUri": gcs_uri },
                "controlImageConfig": { "controlType": control_type.as_str() },
            }),
            ReferenceImage::Subject { id, gcs_uri, subject_type, description } => json!({
                "referenceType": "REFERENCE_TYPE_SUBJECT",
                "referenceId": id,
                "referenceImage": { "gcsUri": gcs_uri },
                "subjectImageConfig": {
                    "subjectType": subject_type,
                    "subjectDescription": description,
                },
            }),
        }
    }
}

async fn predict(
    client: &GcpClient,
    project: &str,
    location: &str,
    model: &str,
    body: &Value,
) -> Result<Vec<Value>> {
    let url = client.aiplatform_url(
        location,
        "v1",
        &format!("{}:predict", publisher_model(project, location, model)),
    );
    debug!("Predicting with {}", model);

    let response = client
        .post(&url, Some(body))
        .await
        .context("failed to generate image")?;
    Ok(response
        .get("predictions")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default())
}

/// Imagen text-to-image, saved as PNG at `output_file`
pub async fn generate_image_with_text(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    prompt: &str,
    output_file: &Path,
) -> Result<usize> {
    let body = json!({
        "instances": [{ "prompt": prompt }],
        "parameters": {
            "sampleCount": 1,
            "imageSize": "2K",
            "outputOptions": { "mimeType": "image/png" },
        },
    });
    let predictions = predict(client, project, location, IMAGEN_GENERATE_MODEL, &body).await?;

    let encoded = predictions
        .first()
        .map(|p| str_field(p, "bytesBase64Encoded"))
        .filter(|data| !data.is_empty())
        .context("no generated images returned")?;
    let image = STANDARD
        .decode(encoded)
        .context("generated image is not valid base64")?;

    save_file(output_file, &image)?;
    writeln!(w, "Created output image using {} bytes", image.len())?;
    Ok(image.len())
}

/// Print text parts and save image parts; returns the saved paths
fn handle_parts(
    w: &mut impl Write,
    parts: &[Value],
    mut next_path: impl FnMut(usize) -> PathBuf,
) -> Result<Vec<PathBuf>> {
    let mut saved = Vec::new();
    for part in parts {
        if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
            writeln!(w, "{}", text)?;
        } else if let Some(data) = inline_data(part)? {
            let path = next_path(saved.len());
            save_file(&path, &data)?;
            writeln!(w, "Image saved to {}", path.display())?;
            saved.push(path);
        }
    }
    Ok(saved)
}

/// Gemini image generation from a text prompt
pub async fn generate_mm_flash_with_text(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    output_file: &Path,
) -> Result<Vec<PathBuf>> {
    let contents = json!([{
        "role": "user",
        "parts": [{ "text": "Generate an image of the Eiffel tower with fireworks in the background." }],
    }]);
    let config = json!({ "responseModalities": ["TEXT", "IMAGE"] });

    let parts = generate_content(
        client,
        project,
        location,
        GEMINI_IMAGE_MODEL,
        contents,
        config,
    )
    .await?;
    handle_parts(w, &parts, |_| output_file.to_path_buf())
}

/// Illustrated recipe with text and images interleaved in one response
pub async fn generate_mm_flash_txt_img_with_text(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let contents = json!([{
        "role": "user",
        "parts": [{
            "text": "Generate an illustrated recipe for a paella. Create images to go alongside the text as you generate the recipe",
        }],
    }]);
    let config = json!({ "responseModalities": ["TEXT", "IMAGE"] });

    let parts = generate_content(
        client,
        project,
        location,
        GEMINI_IMAGE_MODEL,
        contents,
        config,
    )
    .await?;
    handle_parts(w, &parts, |n| output_dir.join(format!("example-image-{}.png", n + 1)))
}

/// Edit a local image with a text instruction
pub async fn generate_image_mm_flash_edit_with_text_img(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    input_image: &Path,
    output_file: &Path,
) -> Result<Vec<PathBuf>> {
    let image = std::fs::read(input_image)
        .with_context(|| format!("failed to read {}", input_image.display()))?;

    let contents = json!([{
        "role": "user",
        "parts": [
            { "text": "Edit this image to make it look like a cartoon" },
            { "inlineData": { "mimeType": "image/png", "data": STANDARD.encode(&image) } },
        ],
    }]);
    let config = json!({ "responseModalities": ["TEXT", "IMAGE"] });

    let parts = generate_content(
        client,
        project,
        location,
        GEMINI_IMAGE_MODEL,
        contents,
        config,
    )
    .await?;
    handle_parts(w, &parts, |_| output_file.to_path_buf())
}

/// Imagen capability edit; the results land under `output_gcs_uri`
pub async fn edit_image(
    client: &GcpClient,
    project: &str,
    location: &str,
    prompt: &str,
    references: &[ReferenceImage],
    edit_mode: Option<&str>,
    output_gcs_uri: &str,
) -> Result<String> {
    let mut parameters = json!({
        "sampleCount": 1,
        "safetySetting": "block_medium_and_above",
        "personGeneration": "allow_adult",
        "storageUri": output_gcs_uri,
    });
    if let Some(mode) = edit_mode {
        parameters["editMode"] = json!(mode);
    }

    let body = json!({
        "instances": [{
            "prompt": prompt,
            "referenceImages": references.iter().map(ReferenceImage::to_json).collect::<Vec<_>>(),
        }],
        "parameters": parameters,
    });

    let predictions = predict(client, project, location, IMAGEN_CAPABILITY_MODEL, &body)
        .await
        .context("failed to edit image")?;

    let uri = predictions
        .first()
        .map(|p| str_field(p, "gcsUri"))
        .filter(|uri| !uri.is_empty())
        .context("no generated images returned")?;

    info!("Edited image written to {}", uri);
    Ok(uri.to_string())
}

const CONTROLLED_EDITING: &str = "EDIT_MODE_CONTROLLED_EDITING";

/// Style transfer from a neon sign reference
pub async fn generate_style_ref_with_text(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    output_gcs_uri: &str,
) -> Result<String> {
    let references = [ReferenceImage::Style {
        id: 1,
        gcs_uri: "gs://cloud-samples-data/generative-ai/image/neon.png".to_string(),
        description: "neon sign".to_string(),
    }];
    let uri = edit_image(
        client,
        project,
        location,
        "generate an image of a neon sign [1] with the words: have a great day",
        &references,
        None,
        output_gcs_uri,
    )
    .await?;

    writeln!(w, "{}", uri)?;
    Ok(uri)
}

/// Controlled editing from a Canny edge map
pub async fn generate_canny_ctrl_type_with_text(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    output_gcs_uri: &str,
) -> Result<String> {
    let references = [ReferenceImage::Control {
        id: 1,
        gcs_uri: "gs://cloud-samples-data/generative-ai/image/car_canny.png".to_string(),
        control_type: ControlType::Canny,
    }];
    let uri = edit_image(
        client,
        project,
        location,
        "a watercolor painting of a red car[1] driving on a road",
        &references,
        Some(CONTROLLED_EDITING),
        output_gcs_uri,
    )
    .await?;

    writeln!(w, "{}", uri)?;
    Ok(uri)
}

/// Controlled editing from a scribble
pub async fn generate_scribble_ctrl_type_with_text(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    output_gcs_uri: &str,
) -> Result<String> {
    let references = [ReferenceImage::Control {
        id: 1,
        gcs_uri: "gs://cloud-samples-data/generative-ai/image/car_scribble.png".to_string(),
        control_type: ControlType::Scribble,
    }];
    let uri = edit_image(
        client,
        project,
        location,
        "an oil painting showing the side of a red car[1]",
        &references,
        Some(CONTROLLED_EDITING),
        output_gcs_uri,
    )
    .await?;

    writeln!(w, "{}", uri)?;
    Ok(uri)
}

/// Subject customization posed by a face mesh control image
pub async fn generate_subj_ref_ctrl_refer_with_text(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    output_gcs_uri: &str,
) -> Result<String> {
    let person = "gs://cloud-samples-data/generative-ai/image/person.png";
    let references = [
        ReferenceImage::Subject {
            id: 1,
            gcs_uri: person.to_string(),
            subject_type: "SUBJECT_TYPE_PERSON".to_string(),
            description: "a headshot of a woman".to_string(),
        },
        ReferenceImage::Control {
            id: 2,
            gcs_uri: person.to_string(),
            control_type: ControlType::FaceMesh,
        },
    ];
    let uri = edit_image(
        client,
        project,
        location,
        "a portrait of a woman[1] in the pose of the control image[2] in a watercolor style...",
        &references,
        None,
        output_gcs_uri,
    )
    .await?;

    writeln!(w, "{}", uri)?;
    Ok(uri)
}

/// Restyle the subject of a raw reference image
pub async fn generate_raw_refer_with_text(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    output_gcs_uri: &str,
) -> Result<String> {
    let references = [ReferenceImage::Raw {
        id: 1,
        gcs_uri: "gs://cloud-samples-data/generative-ai/image/teacup-1.png".to_string(),
    }];
    let uri = edit_image(
        client,
        project,
        location,
        "transform the subject in the image so that the teacup[1] is made entirely out of chocolate",
        &references,
        None,
        output_gcs_uri,
    )
    .await?;

    writeln!(w, "{}", uri)?;
    Ok(uri)
}
