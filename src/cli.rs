//! Subcommands of the `gcp-snippets` binary, one group per service area

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use gcp_snippets::compute::{self, CpuSeries, CustomMachineType, IpType};
use gcp_snippets::config::Config;
use gcp_snippets::credentials::okta::{self, OktaSettings};
use gcp_snippets::credentials::{
    adc, api_key, id_token, impersonation, OktaClientCredentialsSupplier,
};
use gcp_snippets::gaming;
use gcp_snippets::gcp::auth::GcpCredentials;
use gcp_snippets::gcp::client::{Endpoints, GcpClient};
use gcp_snippets::genai::{image, live};
use gcp_snippets::parametermanager::{params, versions, ParameterFormat, ParameterLocation};
use gcp_snippets::privateca;
use gcp_snippets::securitycenter::{v1, v2};
use gcp_snippets::spanner::{leaderboard, snippets, LeaderboardCommand, SnippetCommand};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const ONE_YEAR_SECS: i64 = 365 * 24 * 60 * 60;

/// Resolved defaults shared by every subcommand
pub struct Context {
    pub config: Config,
    pub project: Option<String>,
    pub zone: String,
    pub region: String,
    pub endpoints: Endpoints,
    /// Used instead of Application Default Credentials when set
    pub credentials: Option<GcpCredentials>,
}

impl Context {
    fn project(&self) -> Result<&str> {
        self.project.as_deref().context(
            "No GCP project configured. Set GOOGLE_CLOUD_PROJECT or use --project flag",
        )
    }

    fn location(&self, cli: Option<&str>) -> String {
        self.config.effective_location(cli)
    }

    fn organization(&self, cli: Option<&str>) -> Result<String> {
        cli.map(str::to_string)
            .or_else(|| self.config.organization_id.clone())
            .context("No organization configured. Use --organization")
    }

    /// ADC-backed client pointed at the configured endpoints
    async fn client(&self) -> Result<GcpClient> {
        let client = match &self.credentials {
            Some(credentials) => GcpClient::with_credentials(credentials.clone())?,
            None => GcpClient::new().await?,
        };
        Ok(client.with_endpoints(self.endpoints.clone()))
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Authentication and credential snippets
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Compute Engine snippets
    #[command(subcommand)]
    Compute(ComputeCommand),
    /// Game Servers snippets
    #[command(subcommand)]
    Gaming(GamingCommand),
    /// Generative AI snippets on Vertex AI
    Genai(GenaiArgs),
    /// Parameter Manager snippets
    Parametermanager(ParameterArgs),
    /// Certificate Authority Service snippets
    Privateca(PrivatecaArgs),
    /// Security Command Center snippets
    Securitycenter(SecurityCenterArgs),
    /// Cloud Spanner snippets
    #[command(subcommand)]
    Spanner(SpannerCommand),
    /// Show or change saved defaults
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// List buckets with Application Default Credentials
    AdcImplicit,
    /// List buckets with credentials loaded explicitly from ADC sources
    AdcExplicit,
    /// Annotate sample text with an API key
    ApiKey {
        #[arg(long, env = "GOOGLE_API_KEY")]
        api_key: String,
    },
    /// Mint an access token for a service account
    Impersonate {
        service_account: String,
        #[arg(long, default_value = CLOUD_PLATFORM_SCOPE)]
        scope: String,
    },
    /// Fetch an ID token from the metadata server
    IdTokenMetadata { audience: String },
    /// Mint an ID token from a service account key file
    IdTokenServiceAccount { key_file: PathBuf, audience: String },
    /// Verify a Google-signed ID token
    VerifyIdToken { token: String, audience: String },
    /// List buckets with Okta-federated credentials
    OktaSupplier {
        #[arg(long, default_value = OktaSettings::SECRETS_FILE)]
        secrets: PathBuf,
    },
    /// Read a bucket with Okta-federated credentials
    OktaCredentials {
        #[arg(long, default_value = OktaSettings::SECRETS_FILE)]
        secrets: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum ComputeCommand {
    /// Static and ephemeral IP addresses
    #[command(subcommand)]
    Address(AddressCommand),
    /// VM instance lifecycle
    #[command(subcommand)]
    Instances(InstanceCommand),
    /// Validate a custom machine type and print its URL
    MachineType {
        #[arg(value_enum)]
        series: CpuSeries,
        core_count: u32,
        memory_mb: u32,
    },
}

#[derive(Subcommand, Debug)]
pub enum AddressCommand {
    Reserve {
        name: String,
        /// Reserve a global address instead of a regional one
        #[arg(long)]
        global: bool,
        /// Global only: reserve an IPv6 address
        #[arg(long)]
        ipv6: bool,
        /// Regional only: use the Standard network tier
        #[arg(long)]
        standard_tier: bool,
    },
    Get {
        name: String,
        #[arg(long)]
        global: bool,
    },
    List {
        #[arg(long)]
        global: bool,
    },
    Release {
        name: String,
        #[arg(long)]
        global: bool,
    },
    /// Turn an in-use ephemeral IP into a static address
    Promote { ephemeral_ip: String, name: String },
    /// Create a VM with a reserved static IP
    AssignNew { instance: String, ip_address: String },
    /// Give a running VM a static IP
    AssignExisting {
        instance: String,
        ip_address: String,
        #[arg(long, default_value = "nic0")]
        nic: String,
    },
    /// Remove a static IP from a VM
    Unassign {
        instance: String,
        ip_address: String,
        #[arg(long, default_value = "nic0")]
        nic: String,
    },
    /// Print the IPs of a VM
    Ips {
        instance: String,
        #[arg(long = "type", value_enum, default_value = "external")]
        ip_type: IpType,
    },
}

#[derive(Subcommand, Debug)]
pub enum InstanceCommand {
    Create {
        name: String,
        #[arg(long, default_value = "n1-standard-1")]
        machine_type: String,
        #[arg(long, default_value = "projects/debian-cloud/global/images/family/debian-12")]
        image: String,
        #[arg(long, default_value = "global/networks/default")]
        network: String,
    },
    Get { name: String },
    List {
        /// List across every zone
        #[arg(long)]
        all: bool,
    },
    Delete { name: String },
    Start {
        name: String,
        /// Base64 customer-supplied key of the boot disk
        #[arg(long)]
        encryption_key: Option<String>,
    },
    Stop { name: String },
    Reset { name: String },
    Suspend { name: String },
    Resume { name: String },
    SetMachineType { name: String, machine_type: String },
    FromTemplate { name: String, template: String },
    FromTemplateWithOverrides {
        name: String,
        template: String,
        #[arg(long)]
        machine_type: String,
        #[arg(long)]
        image: String,
    },
    BulkInsert {
        template: String,
        count: i64,
        name_pattern: String,
        #[arg(long)]
        min_count: Option<i64>,
        /// Label as key=value; may be repeated
        #[arg(long = "label", value_parser = parse_label)]
        labels: Vec<(String, String)>,
    },
    CreateCustom {
        name: String,
        #[arg(value_enum)]
        series: CpuSeries,
        core_count: u32,
        memory_mb: u32,
    },
    ExtendMemory { name: String, memory_mb: u32 },
}

#[derive(Subcommand, Debug)]
pub enum GamingCommand {
    #[command(subcommand)]
    Deployment(DeploymentCommand),
    #[command(subcommand)]
    Config(GameConfigCommand),
    #[command(subcommand)]
    Rollout(RolloutCommand),
}

#[derive(Subcommand, Debug)]
pub enum DeploymentCommand {
    Create { deployment: String },
    Get { deployment: String },
    List,
    Delete { deployment: String },
}

#[derive(Subcommand, Debug)]
pub enum GameConfigCommand {
    Create { deployment: String, config: String },
    Get { deployment: String, config: String },
    List { deployment: String },
    Delete { deployment: String, config: String },
}

#[derive(Subcommand, Debug)]
pub enum RolloutCommand {
    Get { deployment: String },
    SetDefault { deployment: String, config: String },
    ClearDefault { deployment: String },
    SetOverride {
        deployment: String,
        config: String,
        realm: String,
        #[arg(long, default_value = "global")]
        realm_location: String,
    },
    ClearOverride { deployment: String },
}

#[derive(Args, Debug)]
pub struct GenaiArgs {
    /// Vertex AI location
    #[arg(long)]
    location: Option<String>,

    #[command(subcommand)]
    command: GenaiCommand,
}

#[derive(Subcommand, Debug)]
pub enum GenaiCommand {
    /// Generate an image with Imagen
    Image {
        output: PathBuf,
        #[arg(long, default_value = "A dog reading a newspaper")]
        prompt: String,
    },
    /// Text and image output from Gemini
    FlashText { output: PathBuf },
    /// Interleaved text and images from Gemini
    FlashTextImage { output_dir: PathBuf },
    /// Edit a local image with Gemini
    FlashEdit { input: PathBuf, output: PathBuf },
    /// Customize with a style reference image
    StyleRef { output_gcs_uri: String },
    /// Customize with a canny edge control image
    Canny { output_gcs_uri: String },
    /// Customize with a scribble control image
    Scribble { output_gcs_uri: String },
    /// Customize with a subject and face mesh control
    SubjectRef { output_gcs_uri: String },
    /// Edit with a raw reference image
    RawRef { output_gcs_uri: String },
    /// JSON calendar event through the OpenAI-compatible endpoint
    StructuredOutput,
    /// Stream a WAV file to the Live API and save the spoken answer
    LiveAudio { audio: PathBuf, output: PathBuf },
}

#[derive(Args, Debug)]
pub struct ParameterArgs {
    /// Regional location; parameters are global when omitted
    #[arg(long)]
    location: Option<String>,

    #[command(subcommand)]
    command: ParameterCommand,
}

#[derive(Subcommand, Debug)]
pub enum ParameterCommand {
    Create {
        parameter: String,
        #[arg(long, value_enum)]
        format: Option<ParameterFormat>,
        #[arg(long)]
        kms_key: Option<String>,
    },
    Get { parameter: String },
    List,
    Delete { parameter: String },
    SetKmsKey { parameter: String, kms_key: String },
    RemoveKmsKey { parameter: String },
    #[command(subcommand)]
    Version(VersionCommand),
}

#[derive(Subcommand, Debug)]
pub enum VersionCommand {
    Create {
        parameter: String,
        version: String,
        payload: String,
        /// Treat the payload as JSON
        #[arg(long)]
        json: bool,
    },
    /// Version whose payload references a Secret Manager secret version
    CreateWithSecret {
        parameter: String,
        version: String,
        secret_version: String,
    },
    Get { parameter: String, version: String },
    List { parameter: String },
    Render { parameter: String, version: String },
    Enable { parameter: String, version: String },
    Disable { parameter: String, version: String },
    Delete { parameter: String, version: String },
}

#[derive(Args, Debug)]
pub struct PrivatecaArgs {
    #[arg(long)]
    location: Option<String>,

    #[command(subcommand)]
    command: PrivatecaCommand,
}

#[derive(Subcommand, Debug)]
pub enum PrivatecaCommand {
    CreatePool { pool: String },
    DeletePool { pool: String },
    CreateCa {
        pool: String,
        ca: String,
        #[arg(long)]
        common_name: String,
        #[arg(long)]
        org: String,
        #[arg(long, default_value_t = ONE_YEAR_SECS)]
        duration_secs: i64,
    },
    EnableCa { pool: String, ca: String },
    DisableCa { pool: String, ca: String },
    DeleteCa { pool: String, ca: String },
    UndeleteCa { pool: String, ca: String },
    CreateCertificate {
        pool: String,
        ca: String,
        certificate: String,
        #[arg(long)]
        common_name: String,
        #[arg(long)]
        domain: String,
        /// PEM encoded public key
        #[arg(long)]
        public_key: PathBuf,
        #[arg(long, default_value_t = ONE_YEAR_SECS)]
        duration_secs: i64,
    },
}

#[derive(Args, Debug)]
pub struct SecurityCenterArgs {
    #[arg(long)]
    organization: Option<String>,

    #[command(subcommand)]
    command: SecurityCenterCommand,
}

#[derive(Subcommand, Debug)]
pub enum SecurityCenterCommand {
    CreateSource,
    GetSource { source: String },
    ListSources,
    UpdateSource { source: String },
    CreateFinding { source: String },
    CreateFindingWithProperties { source: String },
    UpdateFinding { finding: String },
    SetFindingState { finding: String },
    TestIam { source: String },
    ListFindings,
    ListFilteredFindings { source: String },
    ListFindingsAtTime { source: String },
    AddSecurityMarks { finding: String },
    ListFindingsWithMarks { source: String },
    GetSourceIamPolicy { source: String },
    SetSourceIamPolicy { source: String, user: String },
    /// Findings API v2
    #[command(subcommand)]
    V2(SecurityCenterV2Command),
}

#[derive(Subcommand, Debug)]
pub enum SecurityCenterV2Command {
    CreateFinding { source: String },
    UpdateFinding { finding: String },
    SetFindingState { finding: String },
}

#[derive(Subcommand, Debug)]
pub enum SpannerCommand {
    /// Singers and Albums walkthrough
    Snippets {
        command: Option<String>,
        database: Option<String>,
    },
    /// Game leaderboard
    Leaderboard {
        command: Option<String>,
        database: Option<String>,
        /// Hours, for querywithtimespan
        timespan: Option<i64>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    Show,
    SetProject { project: String },
    SetZone { zone: String },
}

fn parse_label(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("invalid label `{}`, expected key=value", s))
}

/// Run one subcommand; the exit code covers usage errors and failed snippets
pub async fn run(w: &mut impl Write, ctx: &Context, command: Command) -> Result<ExitCode> {
    match command {
        Command::Auth(cmd) => run_auth(w, ctx, cmd).await?,
        Command::Compute(cmd) => run_compute(w, ctx, cmd).await?,
        Command::Gaming(cmd) => run_gaming(w, ctx, cmd).await?,
        Command::Genai(args) => run_genai(w, ctx, args).await?,
        Command::Parametermanager(args) => run_parameters(w, ctx, args).await?,
        Command::Privateca(args) => run_privateca(w, ctx, args).await?,
        Command::Securitycenter(args) => run_securitycenter(w, ctx, args).await?,
        Command::Spanner(cmd) => return run_spanner(w, ctx, cmd).await,
        Command::Config(cmd) => run_config(w, ctx, cmd)?,
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_auth(w: &mut impl Write, ctx: &Context, cmd: AuthCommand) -> Result<()> {
    match cmd {
        AuthCommand::AdcImplicit => {
            let client = ctx.client().await?;
            adc::authenticate_implicit_with_adc(w, &client, ctx.project()?).await?;
        }
        AuthCommand::AdcExplicit => {
            adc::authenticate_explicit_with_adc(w, &ctx.endpoints, ctx.project()?).await?;
        }
        AuthCommand::ApiKey { api_key } => {
            api_key::authenticate_with_api_key(w, &ctx.endpoints, &api_key).await?;
        }
        AuthCommand::Impersonate {
            service_account,
            scope,
        } => {
            let client = ctx.client().await?;
            impersonation::get_access_token_from_impersonated_credentials(
                w,
                &client,
                &service_account,
                &scope,
            )
            .await?;
        }
        AuthCommand::IdTokenMetadata { audience } => {
            id_token::get_id_token_from_metadata_server(w, &ctx.endpoints, &audience).await?;
        }
        AuthCommand::IdTokenServiceAccount { key_file, audience } => {
            id_token::get_id_token_from_service_account(w, &ctx.endpoints, &key_file, &audience)
                .await?;
        }
        AuthCommand::VerifyIdToken { token, audience } => {
            id_token::verify_google_id_token(w, &ctx.endpoints, &token, &audience).await?;
        }
        AuthCommand::OktaSupplier { secrets } => {
            let settings = OktaSettings::load(&secrets);
            let supplier = okta_supplier(&settings)?;
            okta::authenticate_with_okta_supplier(
                w,
                &ctx.endpoints,
                &settings,
                ctx.project()?,
                supplier,
            )
            .await?;
        }
        AuthCommand::OktaCredentials { secrets } => {
            let settings = OktaSettings::load(&secrets);
            let supplier = okta_supplier(&settings)?;
            okta::authenticate_with_okta_credentials(w, &ctx.endpoints, &settings, supplier).await?;
        }
    }
    Ok(())
}

fn okta_supplier(settings: &OktaSettings) -> Result<Arc<OktaClientCredentialsSupplier>> {
    let missing = settings.missing();
    if !missing.is_empty() {
        anyhow::bail!("missing required configuration: {}", missing.join(", "));
    }
    Ok(Arc::new(OktaClientCredentialsSupplier::new(
        &settings.domain,
        &settings.client_id,
        &settings.client_secret,
    )?))
}

async fn run_compute(w: &mut impl Write, ctx: &Context, cmd: ComputeCommand) -> Result<()> {
    if let ComputeCommand::MachineType {
        series,
        core_count,
        memory_mb,
    } = cmd
    {
        let machine_type = CustomMachineType::new(&ctx.zone, series, memory_mb, core_count)?;
        writeln!(w, "{}", machine_type)?;
        return Ok(());
    }

    let client = ctx.client().await?;
    let project = ctx.project()?;
    let (zone, region) = (ctx.zone.as_str(), ctx.region.as_str());

    match cmd {
        ComputeCommand::Address(cmd) => run_address(w, &client, project, zone, region, cmd).await,
        ComputeCommand::Instances(cmd) => run_instances(w, &client, project, zone, cmd).await,
        ComputeCommand::MachineType { .. } => Ok(()),
    }
}

async fn run_address(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    region: &str,
    cmd: AddressCommand,
) -> Result<()> {
    use compute::address;

    match cmd {
        AddressCommand::Reserve {
            name,
            global: true,
            ipv6,
            ..
        } => {
            address::reserve_new_global_external(w, client, project, &name, ipv6).await?;
        }
        AddressCommand::Reserve {
            name,
            standard_tier,
            ..
        } => {
            address::reserve_new_regional_external(
                w,
                client,
                project,
                region,
                &name,
                !standard_tier,
            )
            .await?;
        }
        AddressCommand::Get { name, global } => {
            if global {
                address::get_global_external(w, client, project, &name).await?;
            } else {
                address::get_regional_external(w, client, project, region, &name).await?;
            }
        }
        AddressCommand::List { global } => {
            if global {
                address::list_global_external(w, client, project).await?;
            } else {
                address::list_regional_external(w, client, project, region).await?;
            }
        }
        AddressCommand::Release { name, global } => {
            if global {
                address::release_global_static_external(w, client, project, &name).await?;
            } else {
                address::release_regional_static_external(w, client, project, region, &name)
                    .await?;
            }
        }
        AddressCommand::Promote { ephemeral_ip, name } => {
            address::promote_ephemeral_address(w, client, project, region, &ephemeral_ip, &name)
                .await?;
        }
        AddressCommand::AssignNew {
            instance,
            ip_address,
        } => {
            address::assign_static_external_to_new_vm(
                w,
                client,
                project,
                zone,
                &instance,
                &ip_address,
            )
            .await?;
        }
        AddressCommand::AssignExisting {
            instance,
            ip_address,
            nic,
        } => {
            address::assign_static_address_to_existing_vm(
                w,
                client,
                project,
                zone,
                &instance,
                &ip_address,
                &nic,
            )
            .await?;
        }
        AddressCommand::Unassign {
            instance,
            ip_address,
            nic,
        } => {
            address::unassign_static_address_from_existing_vm(
                w,
                client,
                project,
                zone,
                &instance,
                &ip_address,
                &nic,
            )
            .await?;
        }
        AddressCommand::Ips { instance, ip_type } => {
            address::print_instance_ip_addresses(w, client, project, zone, &instance, ip_type)
                .await?;
        }
    }
    Ok(())
}

async fn run_instances(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    cmd: InstanceCommand,
) -> Result<()> {
    use compute::instances;

    match cmd {
        InstanceCommand::Create {
            name,
            machine_type,
            image,
            network,
        } => {
            instances::create_instance(
                w,
                client,
                project,
                zone,
                &name,
                &machine_type,
                &image,
                &network,
            )
            .await?;
        }
        InstanceCommand::Get { name } => {
            instances::get_instance(w, client, project, zone, &name).await?;
        }
        InstanceCommand::List { all } => {
            if all {
                instances::list_all_instances(w, client, project).await?;
            } else {
                instances::list_instances(w, client, project, zone).await?;
            }
        }
        InstanceCommand::Delete { name } => {
            instances::delete_instance(w, client, project, zone, &name).await?;
        }
        InstanceCommand::Start {
            name,
            encryption_key: Some(key),
        } => {
            instances::start_instance_with_encryption_key(w, client, project, zone, &name, &key)
                .await?;
        }
        InstanceCommand::Start { name, .. } => {
            instances::start_instance(w, client, project, zone, &name).await?;
        }
        InstanceCommand::Stop { name } => {
            instances::stop_instance(w, client, project, zone, &name).await?;
        }
        InstanceCommand::Reset { name } => {
            instances::reset_instance(w, client, project, zone, &name).await?;
        }
        InstanceCommand::Suspend { name } => {
            instances::suspend_instance(w, client, project, zone, &name).await?;
        }
        InstanceCommand::Resume { name } => {
            instances::resume_instance(w, client, project, zone, &name).await?;
        }
        InstanceCommand::SetMachineType { name, machine_type } => {
            instances::change_machine_type(w, client, project, zone, &name, &machine_type).await?;
        }
        InstanceCommand::FromTemplate { name, template } => {
            instances::create_instance_from_template(w, client, project, zone, &name, &template)
                .await?;
        }
        InstanceCommand::FromTemplateWithOverrides {
            name,
            template,
            machine_type,
            image,
        } => {
            instances::create_instance_from_template_with_overrides(
                w,
                client,
                project,
                zone,
                &name,
                &template,
                &machine_type,
                &image,
            )
            .await?;
        }
        InstanceCommand::BulkInsert {
            template,
            count,
            name_pattern,
            min_count,
            labels,
        } => {
            let labels =
                (!labels.is_empty()).then(|| labels.into_iter().collect::<HashMap<_, _>>());
            instances::bulk_insert_instances(
                w,
                client,
                project,
                zone,
                &template,
                count,
                &name_pattern,
                min_count,
                labels,
            )
            .await?;
        }
        InstanceCommand::CreateCustom {
            name,
            series,
            core_count,
            memory_mb,
        } => {
            instances::create_instance_with_custom_machine_type(
                w, client, project, zone, &name, series, core_count, memory_mb,
            )
            .await?;
        }
        InstanceCommand::ExtendMemory { name, memory_mb } => {
            instances::modify_instance_with_extended_memory(
                w,
                client,
                project,
                zone,
                &name,
                memory_mb,
            )
            .await?;
        }
    }
    Ok(())
}

async fn run_gaming(w: &mut impl Write, ctx: &Context, cmd: GamingCommand) -> Result<()> {
    let client = ctx.client().await?;
    let project = ctx.project()?;

    match cmd {
        GamingCommand::Deployment(cmd) => match cmd {
            DeploymentCommand::Create { deployment } => {
                gaming::create_game_server_deployment(w, &client, project, &deployment).await?;
            }
            DeploymentCommand::Get { deployment } => {
                gaming::get_game_server_deployment(w, &client, project, &deployment).await?;
            }
            DeploymentCommand::List => {
                gaming::list_game_server_deployments(w, &client, project).await?;
            }
            DeploymentCommand::Delete { deployment } => {
                gaming::delete_game_server_deployment(w, &client, project, &deployment).await?;
            }
        },
        GamingCommand::Config(cmd) => match cmd {
            GameConfigCommand::Create { deployment, config } => {
                gaming::create_game_server_config(w, &client, project, &deployment, &config).await?;
            }
            GameConfigCommand::Get { deployment, config } => {
                gaming::get_game_server_config(w, &client, project, &deployment, &config).await?;
            }
            GameConfigCommand::List { deployment } => {
                gaming::list_game_server_configs(w, &client, project, &deployment).await?;
            }
            GameConfigCommand::Delete { deployment, config } => {
                gaming::delete_game_server_config(w, &client, project, &deployment, &config).await?;
            }
        },
        GamingCommand::Rollout(cmd) => match cmd {
            RolloutCommand::Get { deployment } => {
                gaming::get_game_server_deployment_rollout(w, &client, project, &deployment).await?;
            }
            RolloutCommand::SetDefault { deployment, config } => {
                gaming::update_rollout_default_config(w, &client, project, &deployment, &config)
                    .await?;
            }
            RolloutCommand::ClearDefault { deployment } => {
                gaming::update_rollout_clear_default_config(w, &client, project, &deployment)
                    .await?;
            }
            RolloutCommand::SetOverride {
                deployment,
                config,
                realm,
                realm_location,
            } => {
                gaming::update_rollout_override_config(
                    w,
                    &client,
                    project,
                    &realm_location,
                    &realm,
                    &deployment,
                    &config,
                )
                .await?;
            }
            RolloutCommand::ClearOverride { deployment } => {
                gaming::update_rollout_clear_override_config(w, &client, project, &deployment)
                    .await?;
            }
        },
    }
    Ok(())
}

async fn run_genai(w: &mut impl Write, ctx: &Context, args: GenaiArgs) -> Result<()> {
    let client = ctx.client().await?;
    let project = ctx.project()?;
    let location = ctx.location(args.location.as_deref());
    let location = location.as_str();

    match args.command {
        GenaiCommand::Image { output, prompt } => {
            image::generate_image_with_text(w, &client, project, location, &prompt, &output).await?;
        }
        GenaiCommand::FlashText { output } => {
            image::generate_mm_flash_with_text(w, &client, project, location, &output).await?;
        }
        GenaiCommand::FlashTextImage { output_dir } => {
            image::generate_mm_flash_txt_img_with_text(w, &client, project, location, &output_dir)
                .await?;
        }
        GenaiCommand::FlashEdit { input, output } => {
            image::generate_image_mm_flash_edit_with_text_img(
                w, &client, project, location, &input, &output,
            )
            .await?;
        }
        GenaiCommand::StyleRef { output_gcs_uri } => {
            image::generate_style_ref_with_text(w, &client, project, location, &output_gcs_uri)
                .await?;
        }
        GenaiCommand::Canny { output_gcs_uri } => {
            image::generate_canny_ctrl_type_with_text(
                w,
                &client,
                project,
                location,
                &output_gcs_uri,
            )
            .await?;
        }
        GenaiCommand::Scribble { output_gcs_uri } => {
            image::generate_scribble_ctrl_type_with_text(
                w,
                &client,
                project,
                location,
                &output_gcs_uri,
            )
            .await?;
        }
        GenaiCommand::SubjectRef { output_gcs_uri } => {
            image::generate_subj_ref_ctrl_refer_with_text(
                w,
                &client,
                project,
                location,
                &output_gcs_uri,
            )
            .await?;
        }
        GenaiCommand::RawRef { output_gcs_uri } => {
            image::generate_raw_refer_with_text(w, &client, project, location, &output_gcs_uri)
                .await?;
        }
        GenaiCommand::StructuredOutput => {
            live::generate_structured_output_with_txt(w, &client, project, location).await?;
        }
        GenaiCommand::LiveAudio { audio, output } => {
            live::generate_live_audio_conversation(w, &client, project, location, &audio, &output)
                .await?;
        }
    }
    Ok(())
}

async fn run_parameters(w: &mut impl Write, ctx: &Context, args: ParameterArgs) -> Result<()> {
    let client = ctx.client().await?;
    let project = ctx.project()?;
    let location = match args.location {
        Some(location) if location != "global" => ParameterLocation::Regional(location),
        _ => ParameterLocation::Global,
    };
    let loc = &location;

    match args.command {
        ParameterCommand::Create {
            parameter,
            kms_key: Some(kms_key),
            ..
        } => {
            params::create_param_with_kms_key(
                w,
                &client,
                loc,
                project,
                &parameter,
                &kms_key,
            )
            .await?;
        }
        ParameterCommand::Create {
            parameter,
            format: Some(format),
            ..
        } => {
            params::create_structured_param(w, &client, loc, project, &parameter, format).await?;
        }
        ParameterCommand::Create { parameter, .. } => {
            params::create_param(w, &client, loc, project, &parameter).await?;
        }
        ParameterCommand::Get { parameter } => {
            params::get_param(w, &client, loc, project, &parameter).await?;
        }
        ParameterCommand::List => {
            params::list_params(w, &client, loc, project).await?;
        }
        ParameterCommand::Delete { parameter } => {
            params::delete_param(w, &client, loc, project, &parameter).await?;
        }
        ParameterCommand::SetKmsKey { parameter, kms_key } => {
            params::update_param_kms_key(w, &client, loc, project, &parameter, &kms_key).await?;
        }
        ParameterCommand::RemoveKmsKey { parameter } => {
            params::remove_param_kms_key(w, &client, loc, project, &parameter).await?;
        }
        ParameterCommand::Version(cmd) => run_versions(w, &client, loc, project, cmd).await?,
    }
    Ok(())
}

async fn run_versions(
    w: &mut impl Write,
    client: &GcpClient,
    loc: &ParameterLocation,
    project: &str,
    cmd: VersionCommand,
) -> Result<()> {
    match cmd {
        VersionCommand::Create {
            parameter,
            version,
            payload,
            json: true,
        } => {
            let payload: serde_json::Value =
                serde_json::from_str(&payload).context("payload is not valid JSON")?;
            versions::create_structured_param_version(
                w, client, loc, project, &parameter, &version, &payload,
            )
            .await?;
        }
        VersionCommand::Create {
            parameter,
            version,
            payload,
            ..
        } => {
            versions::create_param_version(w, client, loc, project, &parameter, &version, &payload)
                .await?;
        }
        VersionCommand::CreateWithSecret {
            parameter,
            version,
            secret_version,
        } => {
            versions::create_param_version_with_secret(
                w,
                client,
                loc,
                project,
                &parameter,
                &version,
                &secret_version,
            )
            .await?;
        }
        VersionCommand::Get { parameter, version } => {
            versions::get_param_version(w, client, loc, project, &parameter, &version).await?;
        }
        VersionCommand::List { parameter } => {
            versions::list_param_versions(w, client, loc, project, &parameter).await?;
        }
        VersionCommand::Render { parameter, version } => {
            versions::render_param_version(w, client, loc, project, &parameter, &version).await?;
        }
        VersionCommand::Enable { parameter, version } => {
            versions::enable_param_version(w, client, loc, project, &parameter, &version).await?;
        }
        VersionCommand::Disable { parameter, version } => {
            versions::disable_param_version(w, client, loc, project, &parameter, &version).await?;
        }
        VersionCommand::Delete { parameter, version } => {
            versions::delete_param_version(w, client, loc, project, &parameter, &version).await?;
        }
    }
    Ok(())
}

async fn run_privateca(w: &mut impl Write, ctx: &Context, args: PrivatecaArgs) -> Result<()> {
    let client = ctx.client().await?;
    let project = ctx.project()?;
    let location = ctx.location(args.location.as_deref());
    let location = location.as_str();

    match args.command {
        PrivatecaCommand::CreatePool { pool } => {
            privateca::create_ca_pool(w, &client, project, location, &pool).await?;
        }
        PrivatecaCommand::DeletePool { pool } => {
            privateca::delete_ca_pool(w, &client, project, location, &pool).await?;
        }
        PrivatecaCommand::CreateCa {
            pool,
            ca,
            common_name,
            org,
            duration_secs,
        } => {
            privateca::create_ca(
                w,
                &client,
                project,
                location,
                &pool,
                &ca,
                &common_name,
                &org,
                duration_secs,
            )
            .await?;
        }
        PrivatecaCommand::EnableCa { pool, ca } => {
            privateca::enable_ca(w, &client, project, location, &pool, &ca).await?;
        }
        PrivatecaCommand::DisableCa { pool, ca } => {
            privateca::disable_ca(w, &client, project, location, &pool, &ca).await?;
        }
        PrivatecaCommand::DeleteCa { pool, ca } => {
            privateca::delete_ca(w, &client, project, location, &pool, &ca).await?;
        }
        PrivatecaCommand::UndeleteCa { pool, ca } => {
            privateca::undelete_ca(w, &client, project, location, &pool, &ca).await?;
        }
        PrivatecaCommand::CreateCertificate {
            pool,
            ca,
            certificate,
            common_name,
            domain,
            public_key,
            duration_secs,
        } => {
            let pem = std::fs::read(&public_key)
                .with_context(|| format!("failed to read {}", public_key.display()))?;
            privateca::create_certificate(
                w,
                &client,
                project,
                location,
                &pool,
                &ca,
                &certificate,
                &common_name,
                &domain,
                duration_secs,
                &pem,
            )
            .await?;
        }
    }
    Ok(())
}

async fn run_securitycenter(
    w: &mut impl Write,
    ctx: &Context,
    args: SecurityCenterArgs,
) -> Result<()> {
    let client = ctx.client().await?;
    let org = || ctx.organization(args.organization.as_deref());

    match args.command {
        SecurityCenterCommand::CreateSource => {
            v1::create_source(w, &client, &org()?).await?;
        }
        SecurityCenterCommand::GetSource { source } => {
            v1::get_source(w, &client, &source).await?;
        }
        SecurityCenterCommand::ListSources => {
            v1::list_sources(w, &client, &org()?).await?;
        }
        SecurityCenterCommand::UpdateSource { source } => {
            v1::update_source(w, &client, &source).await?;
        }
        SecurityCenterCommand::CreateFinding { source } => {
            v1::create_finding(w, &client, &source).await?;
        }
        SecurityCenterCommand::CreateFindingWithProperties { source } => {
            v1::create_finding_with_properties(w, &client, &source).await?;
        }
        SecurityCenterCommand::UpdateFinding { finding } => {
            v1::update_finding_source_properties(w, &client, &finding).await?;
        }
        SecurityCenterCommand::SetFindingState { finding } => {
            v1::set_finding_state(w, &client, &finding).await?;
        }
        SecurityCenterCommand::TestIam { source } => {
            v1::test_iam(w, &client, &source).await?;
        }
        SecurityCenterCommand::ListFindings => {
            v1::list_findings(w, &client, &org()?).await?;
        }
        SecurityCenterCommand::ListFilteredFindings { source } => {
            v1::list_filtered_findings(w, &client, &source).await?;
        }
        SecurityCenterCommand::ListFindingsAtTime { source } => {
            v1::list_findings_at_time(w, &client, &source).await?;
        }
        SecurityCenterCommand::AddSecurityMarks { finding } => {
            v1::add_security_marks(w, &client, &finding).await?;
        }
        SecurityCenterCommand::ListFindingsWithMarks { source } => {
            v1::list_findings_with_marks(w, &client, &source).await?;
        }
        SecurityCenterCommand::GetSourceIamPolicy { source } => {
            v1::get_source_iam_policy(w, &client, &source).await?;
        }
        SecurityCenterCommand::SetSourceIamPolicy { source, user } => {
            v1::set_source_iam_policy(w, &client, &source, &user).await?;
        }
        SecurityCenterCommand::V2(cmd) => match cmd {
            SecurityCenterV2Command::CreateFinding { source } => {
                v2::create_finding(w, &client, &source).await?;
            }
            SecurityCenterV2Command::UpdateFinding { finding } => {
                v2::update_finding_source_properties(w, &client, &finding).await?;
            }
            SecurityCenterV2Command::SetFindingState { finding } => {
                v2::set_finding_state(w, &client, &finding).await?;
            }
        },
    }
    Ok(())
}

async fn run_spanner(w: &mut impl Write, ctx: &Context, cmd: SpannerCommand) -> Result<ExitCode> {
    let result = match cmd {
        SpannerCommand::Snippets { command, database } => {
            let parsed = command.as_deref().and_then(|c| c.parse::<SnippetCommand>().ok());
            let (Some(cmd), Some(db)) = (parsed, database) else {
                return usage_error(snippets::USAGE);
            };
            let client = ctx.client().await?;
            snippets::run(w, &client, cmd, &db).await
        }
        SpannerCommand::Leaderboard {
            command,
            database,
            timespan,
        } => {
            let parsed = command
                .as_deref()
                .and_then(|c| LeaderboardCommand::parse(c, timespan));
            let (Some(cmd), Some(db)) = (parsed, database) else {
                return usage_error(leaderboard::USAGE);
            };
            let client = ctx.client().await?;
            leaderboard::run(w, &client, cmd, &db).await
        }
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            tracing::error!("{:#}", e);
            writeln!(w)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn usage_error(usage: &str) -> Result<ExitCode> {
    eprint!("{}", usage);
    Ok(ExitCode::from(2))
}

fn run_config(w: &mut impl Write, ctx: &Context, cmd: ConfigCommand) -> Result<()> {
    let mut config = ctx.config.clone();
    match cmd {
        ConfigCommand::Show => {
            writeln!(w, "{}", serde_json::to_string_pretty(&config)?)?;
            if let Some(path) = Config::config_path() {
                writeln!(w, "Config file: {}", path.display())?;
            }
        }
        ConfigCommand::SetProject { project } => {
            if !gcp_snippets::gcp::auth::validate_project_id(&project) {
                anyhow::bail!("Invalid project ID format: {}", project);
            }
            config.set_project(&project)?;
            writeln!(w, "Default project set to {}", project)?;
        }
        ConfigCommand::SetZone { zone } => {
            config.set_zone(&zone)?;
            writeln!(w, "Default zone set to {}", zone)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DB: &str = "projects/test-project/instances/test-instance/databases/example-db";

    fn test_context(base: &str) -> Context {
        Context {
            config: Config::default(),
            project: Some("test-project".to_string()),
            zone: "us-central1-a".to_string(),
            region: "us-central1".to_string(),
            endpoints: Endpoints::with_base(base),
            credentials: Some(GcpCredentials::from_static_token("test-token")),
        }
    }

    fn snippets_cmd(command: Option<&str>, database: Option<&str>) -> Command {
        Command::Spanner(SpannerCommand::Snippets {
            command: command.map(str::to_string),
            database: database.map(str::to_string),
        })
    }

    fn leaderboard_cmd(command: &str, database: Option<&str>, timespan: Option<i64>) -> Command {
        Command::Spanner(SpannerCommand::Leaderboard {
            command: Some(command.to_string()),
            database: database.map(str::to_string),
            timespan,
        })
    }

    #[tokio::test]
    async fn test_unknown_spanner_verb_is_usage_error() {
        let ctx = test_context("http://127.0.0.1:9");
        let mut buf = Vec::new();

        let code = run(&mut buf, &ctx, snippets_cmd(Some("dropdatabase"), Some(DB)))
            .await
            .unwrap();

        assert_eq!(code, ExitCode::from(2));
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_missing_database_is_usage_error() {
        let ctx = test_context("http://127.0.0.1:9");

        let mut buf = Vec::new();
        let code = run(&mut buf, &ctx, snippets_cmd(Some("query"), None))
            .await
            .unwrap();
        assert_eq!(code, ExitCode::from(2));

        let code = run(&mut buf, &ctx, leaderboard_cmd("query", None, None))
            .await
            .unwrap();
        assert_eq!(code, ExitCode::from(2));

        let code = run(&mut buf, &ctx, leaderboard_cmd("querywithtimespan", Some(DB), None))
            .await
            .unwrap();
        assert_eq!(code, ExitCode::from(2));
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_failed_spanner_command_exits_with_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("/v1/{}/sessions", DB)))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": 404, "message": "Database not found", "status": "NOT_FOUND"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let mut buf = Vec::new();
        let code = run(&mut buf, &ctx, snippets_cmd(Some("read"), Some(DB)))
            .await
            .unwrap();

        assert_eq!(code, ExitCode::FAILURE);
        let out = String::from_utf8(buf).unwrap();
        assert!(out.starts_with("read failed with failed to create session"));
        assert!(out.contains("Database not found"));
        assert!(out.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_successful_spanner_command_exits_cleanly() {
        let server = MockServer::start().await;
        let session = format!("{}/sessions/s1", DB);

        Mock::given(method("POST"))
            .and(path(format!("/v1/{}/sessions", DB)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": session})))
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path(format!("/v1/{}", session)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("/v1/{}:executeSql", session)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "metadata": {"rowType": {"fields": [{"name": "PlayerId"}]}},
                "rows": []
            })))
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let mut buf = Vec::new();
        let code = run(&mut buf, &ctx, leaderboard_cmd("insertscores", Some(DB), None))
            .await
            .unwrap();

        assert_eq!(code, ExitCode::SUCCESS);
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "No player records currently exist. First insert players then insert scores.\n"
        );
    }
}
