use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use hevm_core::host::{IniKey, IniValue, WaitCondition};
use hevm_core::opcode::{self, disasm};
use hevm_core::{AssetKey, CallbackRegistry, Host, MemoryHost, StartFlags, Vm, VmConfig, VmEvent};

#[derive(Debug, Serialize, Deserialize)]
pub struct HevmProject {
    source: PathBuf,
    disassembly_file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stopped_at: Option<u32>,
}

/// File name an asset is looked up under inside a script directory.
fn asset_file_name(key: &AssetKey) -> String {
    match key {
        AssetKey::Script(n) => format!("script_{}.bin", n),
        AssetKey::ObjectVerb { object, verb } => format!("object_{}_{}.bin", object, verb),
        AssetKey::Room(n) => format!("room_{}.bin", n),
        AssetKey::Sound(n) => format!("sound_{}.bin", n),
        AssetKey::Image(n) => format!("image_{}.bin", n),
        AssetKey::Costume(n) => format!("costume_{}.bin", n),
    }
}

/// Host backed by a directory of raw asset files. Everything else is
/// recorded in memory.
pub struct DirHost {
    root: PathBuf,
    inner: MemoryHost,
}

impl DirHost {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            bail!("{:?} is not a directory", root);
        }
        Ok(Self {
            root,
            inner: MemoryHost::new(),
        })
    }

    pub fn events(&self) -> &[VmEvent] {
        &self.inner.events
    }
}

impl Host for DirHost {
    fn request_asset(&mut self, key: &AssetKey) -> Option<Arc<[u8]>> {
        if let Some(bytes) = self.inner.request_asset(key) {
            return Some(bytes);
        }
        let path = self.root.join(asset_file_name(key));
        match std::fs::read(&path) {
            Ok(bytes) => {
                log::debug!("loaded {} from {:?} ({} bytes)", key, path, bytes.len());
                self.inner.insert(key.clone(), bytes);
                self.inner.request_asset(key)
            }
            Err(e) => {
                log::debug!("{} unavailable at {:?}: {}", key, path, e);
                None
            }
        }
    }

    fn start_sound(&mut self, id: i32) {
        self.inner.start_sound(id)
    }

    fn queue_sound(&mut self, id: i32) {
        self.inner.queue_sound(id)
    }

    fn stop_sound(&mut self, id: i32) {
        self.inner.stop_sound(id)
    }

    fn is_sound_running(&mut self, id: i32) -> bool {
        self.inner.is_sound_running(id)
    }

    fn set_cursor_image(&mut self, image: i32, inventory_state: bool) {
        self.inner.set_cursor_image(image, inventory_state)
    }

    fn set_charset(&mut self, id: i32) {
        self.inner.set_charset(id)
    }

    fn set_charset_colors(&mut self, colors: &[u8]) {
        self.inner.set_charset_colors(colors)
    }

    fn read_ini(&mut self, key: &IniKey) -> Option<IniValue> {
        self.inner.read_ini(key)
    }

    fn write_ini(&mut self, key: &IniKey, value: IniValue) {
        self.inner.write_ini(key, value)
    }

    fn wait_done(&mut self, cond: WaitCondition) -> bool {
        self.inner.wait_done(cond)
    }

    fn event(&mut self, event: VmEvent) {
        match &event {
            VmEvent::Fault(f) => log::error!("{}", f),
            VmEvent::Trace { slot, value, message } => log::info!("trace slot={} value={} {}", slot, value, message),
            other => log::info!("{:?}", other),
        }
        self.inner.event(event)
    }
}

fn write_catalog(output: Option<PathBuf>) -> Result<()> {
    let docs: Vec<_> = opcode::catalog().map(|e| e.doc()).collect();
    let yaml = serde_yaml::to_string(&docs)?;
    match output {
        Some(path) => std::fs::write(&path, yaml).with_context(|| format!("write {:?}", path))?,
        None => std::io::stdout().write_all(yaml.as_bytes())?,
    }
    Ok(())
}

fn write_disassembly(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<()> {
    let input = input.as_ref();
    let code = std::fs::read(input).with_context(|| format!("read {:?}", input))?;
    let listing = disasm::disassemble(&code).with_context(|| format!("disassemble {:?}", input))?;
    if let Some(at) = listing.stopped_at {
        log::warn!("{:?}: stopped at 0x{:X}, the rest of the script is not listed", input, at);
    }

    let output = output.as_ref();
    if !output.exists() {
        std::fs::create_dir_all(output)?;
    }

    let disassembly_path = output.join("disassembly.yaml");
    let mut writer = std::fs::File::create(disassembly_path)?;
    serde_yaml::to_writer(&mut writer, &listing.insts)?;

    let project = HevmProject {
        source: input.to_path_buf(),
        disassembly_file: PathBuf::from("disassembly.yaml"),
        stopped_at: listing.stopped_at,
    };
    let toml_project = output.join("project.toml");
    let mut writer = std::fs::File::create(toml_project)?;
    let serialized_string = toml::to_string_pretty(&project)?;
    writer.write_all(serialized_string.as_bytes())?;

    Ok(())
}

struct RunOptions {
    dir: PathBuf,
    script: i32,
    args: Vec<i32>,
    ticks: u64,
    load: Option<PathBuf>,
    save: Option<PathBuf>,
}

fn run(opts: RunOptions, config: VmConfig) -> Result<DirHost> {
    let mut host = DirHost::new(&opts.dir)?;
    let mut vm = match &opts.load {
        Some(path) => {
            let bytes = std::fs::read(path).with_context(|| format!("read {:?}", path))?;
            Vm::load(&bytes, config, CallbackRegistry::new(), &mut host).with_context(|| format!("load {:?}", path))?
        }
        None => {
            let mut vm = Vm::new(config);
            if vm.start_script(&mut host, opts.script, &opts.args, StartFlags::empty(), false)?.is_none() {
                bail!("script {} not found in {:?}", opts.script, opts.dir);
            }
            vm
        }
    };

    for _ in 0..opts.ticks {
        vm.run_tick(&mut host);
        if host
            .events()
            .iter()
            .any(|e| matches!(e, VmEvent::Quit | VmEvent::Restart))
        {
            log::info!("script requested shutdown at tick {}", vm.tick());
            break;
        }
    }

    if let Some(path) = &opts.save {
        std::fs::write(path, vm.save()?).with_context(|| format!("write {:?}", path))?;
    }
    Ok(host)
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dump the opcode catalog as YAML
    Catalog {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Disassemble one script file into a project directory
    Disasm {
        #[arg(short, long, required = true)]
        input: PathBuf,

        #[arg(short, long, required = true)]
        output: PathBuf,
    },
    /// Run a script from a directory of `script_N.bin` files
    Run {
        #[arg(short, long, required = true)]
        dir: PathBuf,

        #[arg(short, long, default_value_t = 1)]
        script: i32,

        #[arg(short, long, value_delimiter = ',')]
        args: Vec<i32>,

        #[arg(short, long, default_value_t = 60)]
        ticks: u64,

        /// JSON VM configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long)]
        load: Option<PathBuf>,

        #[arg(long)]
        save: Option<PathBuf>,
    },
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    let args = Args::parse();
    match args.command {
        Command::Catalog { output } => {
            env_logger::init();
            write_catalog(output)
        }
        Command::Disasm { input, output } => {
            env_logger::init();
            write_disassembly(input, output)
        }
        Command::Run {
            dir,
            script,
            args,
            ticks,
            config,
            load,
            save,
        } => {
            let config = match config {
                Some(path) => VmConfig::load(path)?,
                None => VmConfig::default(),
            }
            .apply_env();
            env_logger::init_from_env(
                env_logger::Env::default().default_filter_or(config.logger.level_filter.as_str()),
            );

            let host = run(
                RunOptions {
                    dir,
                    script,
                    args,
                    ticks,
                    load,
                    save,
                },
                config,
            )?;
            let faults = host.events().iter().filter(|e| matches!(e, VmEvent::Fault(_))).count();
            if faults > 0 {
                bail!("{} script fault(s)", faults);
            }
            Ok(())
        }
    }
}
