use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::catalog::{Asset, Catalog, Category};
use crate::error::{Result, VtonError};
use crate::garment::{BodyRegion, GarmentSelection};
use crate::pipeline::{OutfitReport, Pipeline, RunReport};
use crate::presets::{OUTFIT_PRESETS, PRESETS};
use crate::remote::{CoarseTryOn, RefineTryOn};

/// A parsed menu choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Shirt and pants on one person.
    Outfit,
    /// One garment from the catalog.
    Single,
    /// Every single-garment example in turn.
    Examples,
    /// Free-form paths typed by the user.
    Custom,
    /// One single-garment example, 1-based.
    Preset(usize),
    /// One outfit example, 1-based.
    OutfitPreset(usize),
    List,
    Add,
    Help,
    Quit,
    Invalid(String),
}

impl Command {
    pub fn parse(input: &str) -> Self {
        let token = input.trim().to_lowercase();
        match token.as_str() {
            "1" | "outfit" => Command::Outfit,
            "2" | "single" => Command::Single,
            "3" | "all" => Command::Examples,
            "4" | "q" | "quit" | "exit" => Command::Quit,
            "custom" => Command::Custom,
            "list" | "ls" => Command::List,
            "add" => Command::Add,
            "help" | "h" | "?" => Command::Help,
            _ => {
                let numbered = |prefix: char| token.strip_prefix(prefix)?.parse::<usize>().ok();
                if let Some(n) = numbered('e') {
                    Command::Preset(n)
                } else if let Some(n) = numbered('o') {
                    Command::OutfitPreset(n)
                } else {
                    Command::Invalid(token)
                }
            }
        }
    }
}

/// Line-oriented user interaction.
pub trait Console {
    /// Shows `prompt` and reads one trimmed line; `Ok(None)` at end of input.
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;
    fn say(&mut self, line: &str);
}

#[derive(Debug, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;

        read_lossy_line(&mut io::stdin().lock())
    }

    fn say(&mut self, line: &str) {
        println!("{line}");
    }
}

/// Reads one trimmed line; bytes that are not UTF-8 become U+FFFD instead of
/// failing the read. `Ok(None)` at end of input.
pub fn read_lossy_line(reader: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut line = Vec::new();
    if reader.read_until(b'\n', &mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&line).trim().to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

enum Pick {
    Chosen(Asset),
    Skip,
    Cancel,
}

const RULE: &str = "============================================================";

pub struct App<C, R> {
    pipeline: Pipeline<C, R>,
    catalog: Catalog,
}

impl<C: CoarseTryOn, R: RefineTryOn> App<C, R> {
    pub fn new(pipeline: Pipeline<C, R>, catalog: Catalog) -> Self {
        Self { pipeline, catalog }
    }

    pub fn pipeline(&self) -> &Pipeline<C, R> {
        &self.pipeline
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Reads commands until quit or end of input.
    pub async fn run_loop(&self, console: &mut dyn Console) -> io::Result<()> {
        self.show_menu(console);
        loop {
            let Some(line) = console.read_line("\nEnter your choice: ")? else {
                console.say("Goodbye!");
                return Ok(());
            };
            if self.dispatch(Command::parse(&line), console).await? == Flow::Quit {
                return Ok(());
            }
        }
    }

    pub async fn dispatch(&self, command: Command, console: &mut dyn Console) -> io::Result<Flow> {
        match command {
            Command::Quit => {
                console.say("Goodbye!");
                return Ok(Flow::Quit);
            }
            Command::Help => self.show_menu(console),
            Command::Outfit => self.outfit_flow(console).await?,
            Command::Single => self.single_flow(console).await?,
            Command::Examples => self.run_examples(console).await,
            Command::Custom => self.custom_flow(console).await?,
            Command::Preset(n) => match n.checked_sub(1).and_then(|i| PRESETS.get(i)) {
                Some(preset) => {
                    console.say(&format!("Running example {n}: {}", preset.title()));
                    let (person, garment) = preset.resolve(self.catalog.root());
                    let result = self.pipeline.run(&person, &garment).await;
                    report_run(console, &result);
                }
                None => console.say(&format!("No example {n} (1-{}).", PRESETS.len())),
            },
            Command::OutfitPreset(n) => match n.checked_sub(1).and_then(|i| OUTFIT_PRESETS.get(i)) {
                Some(preset) => {
                    console.say(&format!("Running outfit {n}: {}", preset.title()));
                    let (person, garments) = preset.resolve(self.catalog.root());
                    let result = self.pipeline.run_outfit(&person, &garments).await;
                    report_outfit(console, &result);
                }
                None => console.say(&format!("No outfit {n} (1-{}).", OUTFIT_PRESETS.len())),
            },
            Command::List => self.list_catalog(console),
            Command::Add => self.add_flow(console)?,
            Command::Invalid(token) => console.say(&format!(
                "Invalid choice `{token}`. Enter 1-4, e1-e{}, o1-o{}, 'all', 'custom', 'list', 'add' or 'q'.",
                PRESETS.len(),
                OUTFIT_PRESETS.len()
            )),
        }
        Ok(Flow::Continue)
    }

    pub fn show_menu(&self, console: &mut dyn Console) {
        console.say(&format!("\n{RULE}"));
        console.say("Two-Step Virtual Try-On");
        console.say("Step 1: coarse try-on → Step 2: refinement");
        console.say(RULE);
        console.say("1. Complete outfit try-on (shirt + pants)");
        console.say("2. Single garment try-on");
        console.say("3. Run all examples");
        console.say("4. Quit");

        console.say("\nExamples:");
        for (i, preset) in PRESETS.iter().enumerate() {
            console.say(&format!("  e{}. {}", i + 1, preset.title()));
        }
        for (i, preset) in OUTFIT_PRESETS.iter().enumerate() {
            console.say(&format!("  o{}. {}", i + 1, preset.title()));
        }

        console.say("\nAlso: 'custom' for your own paths, 'list' to show the catalog, 'add' to file a new image, 'q' to quit");
    }

    async fn outfit_flow(&self, console: &mut dyn Console) -> io::Result<()> {
        console.say("\nComplete outfit try-on");
        let Pick::Chosen(person) = self.pick_asset(Category::Person, false, console)? else {
            console.say("Cancelled.");
            return Ok(());
        };

        let mut garments = Vec::with_capacity(2);
        for category in [Category::Shirt, Category::Pants] {
            match self.pick_asset(category, true, console)? {
                Pick::Chosen(asset) => {
                    let Some(selection) = self.describe(asset, category, console)? else {
                        console.say("Cancelled.");
                        return Ok(());
                    };
                    garments.push(selection);
                }
                Pick::Skip => console.say(&format!("Skipping {category}.")),
                Pick::Cancel => {
                    console.say("Cancelled.");
                    return Ok(());
                }
            }
        }

        if garments.is_empty() {
            console.say("No garment selected, nothing to do.");
            return Ok(());
        }

        let result = self.pipeline.run_outfit(&person.path, &garments).await;
        report_outfit(console, &result);
        Ok(())
    }

    async fn single_flow(&self, console: &mut dyn Console) -> io::Result<()> {
        console.say("\nSingle garment try-on");
        let Pick::Chosen(person) = self.pick_asset(Category::Person, false, console)? else {
            console.say("Cancelled.");
            return Ok(());
        };

        let Some(kind) = console.read_line("Garment type: (s)hirt or (p)ants [s]: ")? else {
            return Ok(());
        };
        let category = match kind.to_lowercase().as_str() {
            "" | "s" | "shirt" => Category::Shirt,
            "p" | "pants" => Category::Pants,
            other => {
                console.say(&format!("Unknown garment type `{other}`."));
                return Ok(());
            }
        };

        let Pick::Chosen(asset) = self.pick_asset(category, false, console)? else {
            console.say("Cancelled.");
            return Ok(());
        };
        let Some(garment) = self.describe(asset, category, console)? else {
            console.say("Cancelled.");
            return Ok(());
        };

        let result = self.pipeline.run(&person.path, &garment).await;
        report_run(console, &result);
        Ok(())
    }

    async fn custom_flow(&self, console: &mut dyn Console) -> io::Result<()> {
        let Some(person) = read_path(console, "Enter person image path: ")? else {
            return Ok(());
        };
        let Some(garment) = read_path(console, "Enter garment image path: ")? else {
            return Ok(());
        };
        let Some(description) = console.read_line("Enter garment description: ")? else {
            return Ok(());
        };
        let Some(region) =
            console.read_line("Enter garment type (upper_body/lower_body/dresses) [upper_body]: ")?
        else {
            return Ok(());
        };
        let region = if region.is_empty() {
            BodyRegion::UpperBody
        } else {
            match region.parse::<BodyRegion>() {
                Ok(region) => region,
                Err(e) => {
                    console.say(&e);
                    return Ok(());
                }
            }
        };

        let result = self
            .pipeline
            .run(Path::new(&person), &GarmentSelection::new(garment, description, region))
            .await;
        report_run(console, &result);
        Ok(())
    }

    async fn run_examples(&self, console: &mut dyn Console) {
        console.say("Running all examples...");
        let mut succeeded = 0;
        for (i, preset) in PRESETS.iter().enumerate() {
            console.say(&format!("\n{}", &RULE[..40]));
            console.say(&format!("Example {}: {}", i + 1, preset.title()));
            console.say(&RULE[..40]);
            let (person, garment) = preset.resolve(self.catalog.root());
            let result = self.pipeline.run(&person, &garment).await;
            if result.is_ok() {
                succeeded += 1;
            }
            report_run(console, &result);
        }
        console.say(&format!("\n{succeeded}/{} examples completed.", PRESETS.len()));
    }

    fn list_catalog(&self, console: &mut dyn Console) {
        for category in Category::ALL {
            match self.catalog.list(category) {
                Ok(assets) => {
                    console.say(&format!("{} ({}):", category.dir(), assets.len()));
                    for asset in assets {
                        console.say(&format!("  - {}", asset.name));
                    }
                }
                Err(e) => console.say(&format!("✗ {}: {e}", category.dir())),
            }
        }
    }

    fn add_flow(&self, console: &mut dyn Console) -> io::Result<()> {
        let Some(kind) = console.read_line("Category (person/shirt/pants): ")? else {
            return Ok(());
        };
        match kind.parse::<Category>() {
            Ok(category) => {
                self.prompt_add(category, console)?;
            }
            Err(e) => console.say(&e),
        }
        Ok(())
    }

    fn pick_asset(
        &self,
        category: Category,
        allow_skip: bool,
        console: &mut dyn Console,
    ) -> io::Result<Pick> {
        loop {
            let assets = match self.catalog.list(category) {
                Ok(assets) => assets,
                Err(e) => {
                    console.say(&format!("✗ {e}"));
                    return Ok(Pick::Cancel);
                }
            };

            console.say(&format!("\nAvailable in {}:", category.dir()));
            if assets.is_empty() {
                console.say("  (none yet)");
            }
            for (i, asset) in assets.iter().enumerate() {
                console.say(&format!("  {}. {}", i + 1, asset.name));
            }
            console.say(&format!("  a. Add a new {category}"));
            if allow_skip {
                console.say(&format!("  s. Skip {category}"));
            }

            let Some(answer) = console.read_line(&format!("Choose {category}: "))? else {
                return Ok(Pick::Cancel);
            };
            match answer.to_lowercase().as_str() {
                "" => return Ok(Pick::Cancel),
                "a" => {
                    if let Some(asset) = self.prompt_add(category, console)? {
                        return Ok(Pick::Chosen(asset));
                    }
                }
                "s" if allow_skip => return Ok(Pick::Skip),
                other => {
                    let chosen = other
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .and_then(|i| assets.get(i));
                    match chosen {
                        Some(asset) => return Ok(Pick::Chosen(asset.clone())),
                        None => console.say("Invalid selection, try again."),
                    }
                }
            }
        }
    }

    fn prompt_add(&self, category: Category, console: &mut dyn Console) -> io::Result<Option<Asset>> {
        let Some(source) = read_path(console, &format!("Path to the new {category} image: "))? else {
            return Ok(None);
        };
        match self.catalog.add(Path::new(&source), category) {
            Ok(asset) => {
                console.say(&format!("✓ {} filed under {}", asset.name, category.dir()));
                Ok(Some(asset))
            }
            Err(e) => {
                console.say(&format!("✗ {e}"));
                Ok(None)
            }
        }
    }

    /// Asks for a description, defaulting to the asset name.
    fn describe(
        &self,
        asset: Asset,
        category: Category,
        console: &mut dyn Console,
    ) -> io::Result<Option<GarmentSelection>> {
        let Some(description) =
            console.read_line(&format!("Describe the {category} [{}]: ", asset.name))?
        else {
            return Ok(None);
        };
        let description = if description.is_empty() {
            asset.name.clone()
        } else {
            description
        };
        Ok(Some(GarmentSelection::new(
            asset.path,
            description,
            category.region().unwrap_or_default(),
        )))
    }
}

/// Reads a path, dropping quotes left by drag-and-drop. Blank means cancel.
fn read_path(console: &mut dyn Console, prompt: &str) -> io::Result<Option<String>> {
    Ok(console
        .read_line(prompt)?
        .map(|p| p.trim_matches(['"', '\'']).trim().to_string())
        .filter(|p| !p.is_empty()))
}

pub fn report_run(console: &mut dyn Console, result: &Result<RunReport>) {
    match result {
        Ok(report) => {
            console.say("✓ Two-step pipeline completed successfully!");
            console.say(&format!("  Step 1 result: {}", report.step1.display()));
            console.say(&format!("  Main result:   {}", report.image.display()));
            console.say(&format!("  Mask result:   {}", report.mask.display()));
        }
        Err(e) => report_error(console, e),
    }
}

pub fn report_outfit(console: &mut dyn Console, result: &Result<OutfitReport>) {
    let report = match result {
        Ok(report) => report,
        Err(e) => return report_error(console, e),
    };

    for (i, layer) in report.completed.iter().enumerate() {
        console.say(&format!("  Layer {}: {}", i + 1, layer.image.display()));
    }
    if let Some(outfit) = &report.outfit {
        console.say("✓ Complete outfit applied!");
        console.say(&format!("  Final outfit: {}", outfit.image.display()));
        console.say(&format!("  Process mask: {}", outfit.mask.display()));
    }
    if let Some(e) = &report.failure {
        report_error(console, e);
        if !report.completed.is_empty() {
            console.say("  Completed layers above were kept.");
        }
    }
}

fn report_error(console: &mut dyn Console, error: &VtonError) {
    console.say(&format!("✗ {error}"));
    if let VtonError::Stage {
        step1: Some(step1), ..
    } = error
    {
        console.say(&format!("  Step 1 result kept at {}", step1.display()));
    }
}
