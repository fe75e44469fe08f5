//! Interactive console menu.

use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::{debug, warn};

use crate::auth::{format_duration, DeviceCodeInfo};
use crate::drive;
use crate::error::AppError;
use crate::graph::{DriveItem, Page};
use crate::session::CredentialSession;

const MENU: &str = "\
Please choose one of the following options:
0. Exit
1. Display access token
2. Make a Graph call
3. List files in OneDrive
4. Recent files (app-only)
5. Create folder (app-only)";

const DEFAULT_FOLDER_NAME: &str = "New Folder";
const INVALID_CHOICE: &str = "Invalid choice";

/// A menu entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Exit,
    DisplayAccessToken,
    MakeGraphCall,
    ListFiles,
    RecentFiles,
    CreateFolder,
}

impl MenuChoice {
    fn from_number(n: i64) -> Option<Self> {
        match n {
            0 => Some(Self::Exit),
            1 => Some(Self::DisplayAccessToken),
            2 => Some(Self::MakeGraphCall),
            3 => Some(Self::ListFiles),
            4 => Some(Self::RecentFiles),
            5 => Some(Self::CreateFolder),
            _ => None,
        }
    }
}

/// One line of user input, classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuInput {
    Choice(MenuChoice),
    Unknown(i64),
    NotANumber,
}

pub fn parse_input(line: &str) -> MenuInput {
    match line.trim().parse::<i64>() {
        Ok(n) => MenuChoice::from_number(n).map_or(MenuInput::Unknown(n), MenuInput::Choice),
        Err(_) => MenuInput::NotANumber,
    }
}

/// Build the challenge callback: print the instructions and optionally open the browser.
pub fn challenge_handler(open_browser: bool) -> impl Fn(&DeviceCodeInfo) + Send + Sync + 'static {
    move |info: &DeviceCodeInfo| {
        println!("{}", info.message());
        if open_browser {
            if let Err(e) = open::that(&info.verification_uri) {
                warn!("Failed to open browser: {}", e);
            }
        }
    }
}

/// Print the greeting for the signed-in user.
pub async fn greet_user(session: &CredentialSession) {
    match session.current_user().await {
        Ok(user) => {
            println!("Hello, {}!", user.display_name_or_upn());
            println!("Email: {}", user.email());
        }
        Err(e) => report("Error getting user", &e),
    }
}

/// Run the menu loop until the user exits or stdin closes.
pub async fn run(session: &CredentialSession) -> io::Result<()> {
    let mut lines = BufReader::new(io::stdin()).lines();

    loop {
        println!();
        println!("{}", MENU);

        let Some(line) = lines.next_line().await? else {
            println!("Goodbye...");
            return Ok(());
        };

        match parse_input(&line) {
            MenuInput::NotANumber => {
                debug!("Ignoring non-numeric input {:?}", line.trim());
                continue;
            }
            MenuInput::Unknown(_) => println!("{}", INVALID_CHOICE),
            MenuInput::Choice(MenuChoice::Exit) => {
                println!("Goodbye...");
                return Ok(());
            }
            MenuInput::Choice(MenuChoice::DisplayAccessToken) => display_access_token(session).await,
            MenuInput::Choice(MenuChoice::MakeGraphCall) => make_graph_call(session).await,
            MenuInput::Choice(MenuChoice::ListFiles) => list_files(session).await,
            MenuInput::Choice(MenuChoice::RecentFiles) => recent_files(session).await,
            MenuInput::Choice(MenuChoice::CreateFolder) => create_folder(session, &mut lines).await?,
        }
    }
}

async fn display_access_token(session: &CredentialSession) {
    match session.user_token().await {
        Ok(token) => {
            println!("Access token: {}", token.secret());
            match token.expires_in() {
                Some(remaining) => println!(
                    "Expires in {} (at {})",
                    format_duration(remaining),
                    token.expires_at().format("%Y-%m-%d %H:%M:%S UTC")
                ),
                None => println!("Token has expired"),
            }
        }
        Err(e) => report("Error getting access token", &e),
    }
}

async fn make_graph_call(session: &CredentialSession) {
    if let Err(e) = ensure_app(session) {
        report("Error initializing Graph for app-only auth", &e);
        return;
    }
    match drive::get_all_files(session).await {
        Ok(page) => print_items(&page),
        Err(e) => report("Error making Graph call", &e),
    }
}

async fn list_files(session: &CredentialSession) {
    match drive::list_root_children(session).await {
        Ok(page) => {
            for url in page.web_urls() {
                println!("{}", url);
            }
            if page.has_more() {
                println!("More files available, showing the first page only");
            }
        }
        Err(e) => report("Error getting files", &e),
    }
}

async fn recent_files(session: &CredentialSession) {
    if let Err(e) = ensure_app(session) {
        report("Error initializing Graph for app-only auth", &e);
        return;
    }
    match drive::get_recent_files(session).await {
        Ok(page) => print_items(&page),
        Err(e) => report("Error getting recent files", &e),
    }
}

async fn create_folder(
    session: &CredentialSession,
    lines: &mut Lines<BufReader<Stdin>>,
) -> io::Result<()> {
    if let Err(e) = ensure_app(session) {
        report("Error initializing Graph for app-only auth", &e);
        return Ok(());
    }

    let mut stdout = io::stdout();
    stdout
        .write_all(format!("Folder name [{}]: ", DEFAULT_FOLDER_NAME).as_bytes())
        .await?;
    stdout.flush().await?;

    let input = lines.next_line().await?.unwrap_or_default();
    let name = match input.trim() {
        "" => DEFAULT_FOLDER_NAME,
        name => name,
    };

    match drive::create_folder(session, name).await {
        Ok(item) => {
            println!("Created folder {}", item.name.as_deref().unwrap_or(name));
            if let Some(url) = &item.web_url {
                println!("{}", url);
            }
        }
        Err(e) => report("Error creating folder", &e),
    }
    Ok(())
}

fn ensure_app(session: &CredentialSession) -> Result<(), AppError> {
    session.ensure_app_auth()?;
    if let Some(owner) = session.config().and_then(|c| c.drive_owner()) {
        debug!("App-only calls target the drive of {}", owner);
    }
    Ok(())
}

fn print_items(page: &Page<DriveItem>) {
    if page.value.is_empty() {
        println!("No items found");
        return;
    }
    for item in &page.value {
        println!("{}", describe_item(item));
    }
    if page.has_more() {
        println!("More items available, showing the first page only");
    }
}

fn describe_item(item: &DriveItem) -> String {
    let name = item.name.as_deref().unwrap_or("(unnamed)");
    let mut line = if item.is_folder() {
        match item.folder.as_ref().and_then(|f| f.child_count) {
            Some(count) => format!("[{}] (folder, {} items)", name, count),
            None => format!("[{}] (folder)", name),
        }
    } else {
        let mime_type = item.file.as_ref().and_then(|f| f.mime_type.as_deref());
        match (item.size, mime_type) {
            (Some(size), Some(mime)) => format!("{} ({} bytes, {})", name, size, mime),
            (Some(size), None) => format!("{} ({} bytes)", name, size),
            (None, Some(mime)) => format!("{} ({})", name, mime),
            (None, None) => name.to_string(),
        }
    };
    if let Some(modified) = item.last_modified_date_time {
        line.push_str(&format!(", modified {}", modified.format("%Y-%m-%d %H:%M")));
    }
    if let Some(id) = &item.id {
        line.push_str(&format!(", id {}", id));
    }
    if let Some(url) = &item.web_url {
        line.push_str(&format!("\n  {}", url));
    }
    line
}

/// Print a failed operation: context, a short hint and the error itself.
fn report(context: &str, error: &AppError) {
    if error.is_remote() {
        warn!("{}: {}", context, error);
    }
    println!("{}", context);
    println!("{}", error.user_message());
    println!("{}", error);
}
