use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use ota_core::{
    decide, Decision, HttpResponse, HttpTransport, Manifest, ManifestFetcher, Md5Verifier,
    TransportError, UpdateOutcome, UrlPolicy, VersionScheme, VersionSpec, DEFAULT_REDIRECT_BUDGET,
};
use reqwest::blocking::{Client, Response};
use reqwest::redirect::Policy;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "ota-tool")]
#[command(about = "ESP32 OTA Updater manifest tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Scheme {
    Counter,
    Semver,
}

impl From<Scheme> for VersionScheme {
    fn from(scheme: Scheme) -> Self {
        match scheme {
            Scheme::Counter => VersionScheme::Counter,
            Scheme::Semver => VersionScheme::SemVer,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write the manifest that publishes a firmware image
    Manifest {
        /// Firmware image to publish
        #[arg(value_name = "FIRMWARE")]
        firmware: PathBuf,

        /// URL the devices will download the image from
        #[arg(short, long)]
        url: String,

        /// Version of the image ("7" or "1.2.3a")
        #[arg(short, long)]
        version: String,

        #[arg(long, value_enum, default_value = "counter")]
        scheme: Scheme,

        /// Human readable version shown in device logs
        #[arg(short, long, default_value = "")]
        display: String,

        /// Leave the MD5 line empty
        #[arg(long)]
        no_md5: bool,

        /// Output file
        #[arg(short, long, default_value = "manifest.txt")]
        out: PathBuf,
    },
    /// Fetch a manifest the way a device would and report the decision
    Check {
        /// Manifest URL configured on the device
        #[arg(value_name = "MANIFEST_URL")]
        url: String,

        /// Version the device is running
        #[arg(short, long)]
        current: String,

        #[arg(long, value_enum, default_value = "counter")]
        scheme: Scheme,

        /// Requests allowed, redirects included
        #[arg(long, default_value_t = DEFAULT_REDIRECT_BUDGET)]
        budget: u8,

        /// Also download the image and verify its size and MD5
        #[arg(long)]
        verify: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Manifest {
            firmware,
            url,
            version,
            scheme,
            display,
            no_md5,
            out,
        } => write_manifest(&firmware, url, &version, scheme.into(), display, !no_md5, &out),
        Commands::Check {
            url,
            current,
            scheme,
            budget,
            verify,
        } => check_manifest(&url, &current, scheme.into(), budget, verify),
    };

    if let Err(e) = result {
        println!("{} {:#}", "❌".red(), e);
        std::process::exit(1);
    }
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("   {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Hash `source` in chunks, advancing `pb` as bytes go by.
fn hash_stream<R: Read>(mut source: R, pb: &ProgressBar) -> io::Result<Md5Verifier> {
    let mut verifier = Md5Verifier::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = source.read(&mut buf)?;
        if n == 0 {
            break;
        }
        verifier.update(&buf[..n]);
        pb.inc(n as u64);
    }
    Ok(verifier)
}

fn write_manifest(
    firmware: &Path,
    binary_url: String,
    version: &str,
    scheme: VersionScheme,
    display_version: String,
    with_md5: bool,
    out: &Path,
) -> Result<()> {
    let version = VersionSpec::parse_as(scheme, version)
        .with_context(|| format!("invalid {} version '{}'", scheme, version))?;
    if UrlPolicy::for_root(&binary_url) == UrlPolicy::AllowPlain {
        println!("{} binary URL is plain HTTP; devices on an https manifest will refuse it", "⚠".yellow());
    }

    let file = File::open(firmware)
        .with_context(|| format!("firmware not found: {}", firmware.display()))?;
    let size = file.metadata()?.len();
    if size == 0 {
        bail!("firmware image {} is empty", firmware.display());
    }

    println!("📦 {} {} ({} bytes, {:.2} MB)", "Hashing".cyan(), firmware.display(), size, size as f64 / 1024.0 / 1024.0);
    let checksum = if with_md5 {
        let pb = progress_bar(size);
        let verifier = hash_stream(file, &pb)?;
        pb.finish_and_clear();
        Some(verifier.finish())
    } else {
        None
    };

    let manifest = Manifest {
        binary_url,
        version,
        checksum,
        display_version,
    };
    let wire = manifest.to_wire();

    // Whatever we write must read back the same on the device
    let reparsed = Manifest::parse(&wire, scheme).context("generated manifest does not parse")?;
    if reparsed != manifest {
        bail!("generated manifest does not round-trip");
    }

    fs::write(out, &wire).with_context(|| format!("failed to write {}", out.display()))?;
    println!("{} {}", "✅ Manifest written to".green(), out.display());
    print!("{}", wire);
    Ok(())
}

/// Blocking reqwest client that leaves redirects to the caller
struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .redirect(Policy::none())
            .build()?;
        Ok(Self { client })
    }
}

struct ReqwestResponse(Response);

impl Read for ReqwestResponse {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl HttpResponse for ReqwestResponse {
    fn status(&self) -> u16 {
        self.0.status().as_u16()
    }

    fn header(&self, name: &str) -> Option<String> {
        self.0
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    fn content_length(&self) -> Option<u64> {
        self.0.content_length()
    }
}

impl HttpTransport for ReqwestTransport {
    type Response = ReqwestResponse;

    fn get(&mut self, url: &str) -> Result<ReqwestResponse, TransportError> {
        self.client
            .get(url)
            .send()
            .map(ReqwestResponse)
            .map_err(|e| TransportError::Connection(e.to_string()))
    }
}

fn check_manifest(
    url: &str,
    current: &str,
    scheme: VersionScheme,
    budget: u8,
    verify: bool,
) -> Result<()> {
    let current = VersionSpec::parse_as(scheme, current)
        .with_context(|| format!("invalid {} version '{}'", scheme, current))?;
    let policy = UrlPolicy::for_root(url);
    let mut http = ReqwestTransport::new()?;

    println!("🔍 {} {} ({:?})", "Fetching".cyan(), url, policy);
    let fetcher = ManifestFetcher::new(policy, scheme);
    let manifest = match fetcher.fetch(&mut http, url, budget) {
        Ok(manifest) => manifest,
        Err(e) => bail!("{} ({})", e, UpdateOutcome::from(&e)),
    };

    println!("   Binary:   {}", manifest.binary_url);
    println!("   Version:  {} {}", manifest.version, manifest.display_version);
    println!(
        "   MD5:      {}",
        manifest.checksum.as_ref().map(|c| c.as_str()).unwrap_or("<none>")
    );

    match decide(&current, &manifest) {
        Decision::UpdateAvailable => println!("✨ {} {} -> {}", "Update available:".green(), current, manifest.version),
        Decision::UpToDate => println!("✓ {} (running {})", "Up to date".green(), current),
    }

    if verify {
        verify_image(&mut http, policy, &manifest)?;
    }
    Ok(())
}

fn verify_image(http: &mut ReqwestTransport, policy: UrlPolicy, manifest: &Manifest) -> Result<()> {
    if !policy.permits(&manifest.binary_url) {
        bail!("devices would refuse non-SSL binary URL {}", manifest.binary_url);
    }

    let response = http.get(&manifest.binary_url)?;
    if response.status() != 200 {
        bail!("binary download returned HTTP {}", response.status());
    }
    let declared = match response.content_length() {
        Some(n) if n > 0 => n,
        _ => bail!("binary has no Content-Length; devices treat that as an empty payload"),
    };

    let pb = progress_bar(declared);
    let verifier = hash_stream(response, &pb)?;
    pb.finish_and_clear();

    if verifier.bytes() != declared {
        bail!("downloaded {} of {} declared bytes", verifier.bytes(), declared);
    }
    match &manifest.checksum {
        Some(expected) => {
            verifier.verify(expected)?;
            println!("✅ {} {} bytes, MD5 {}", "Image verified:".green(), declared, expected);
        }
        None => println!("✅ {} {} bytes (no MD5 published)", "Image downloaded:".green(), declared),
    }
    Ok(())
}
