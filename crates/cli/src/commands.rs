use crate::{
    BackupArgs, Commands, DumpArgs, FolderCopyArgs, ListOwnedArgs, MailArgs, TransferCsvArgs,
};
use anyhow::{bail, Result};
use gapi_helper::{GapiConfig, ServiceAccountCredentials};
use gapi_helper_drive::DriveService;
use gapi_helper_mail::MailService;
use gapi_helper_sheets::{parse_spreadsheet_id, SheetsService};
use gapi_helper_tasks::{
    TaskOptions, TransferCsvTask, TransferDestination, TransferTask, TransferredRange,
};
use tracing::info;

pub async fn run(command: &Commands, config: &GapiConfig) -> Result<()> {
    let credentials = ServiceAccountCredentials::from_file(&config.credentials)?;
    match command {
        Commands::Dump(args) => handle_dump(args, config, &credentials).await,
        Commands::Copy(args) => handle_folder_copy(args, config, &credentials, false).await,
        Commands::Duplicate(args) => handle_folder_copy(args, config, &credentials, true).await,
        Commands::TransferCsv(args) => handle_transfer_csv(args, config, &credentials).await,
        Commands::Backup(args) => handle_backup(args, config, &credentials).await,
        Commands::ListOwned(args) => handle_list_owned(args, config, &credentials).await,
        Commands::Mail(args) => handle_mail(args, config, &credentials).await,
    }
}

async fn handle_dump(
    args: &DumpArgs,
    config: &GapiConfig,
    credentials: &ServiceAccountCredentials,
) -> Result<()> {
    let sheets = SheetsService::new(config, credentials);
    let source = sheets.spreadsheet(&parse_spreadsheet_id(&args.source), None);
    let destination = sheets.spreadsheet(&parse_spreadsheet_id(&args.destination), None);

    source.dump_to(&destination, args.dry_run).await?;
    println!("Dumped {} into {}", source.id(), destination.id());
    Ok(())
}

/// `copy` makes a Drive copy; `duplicate` (`values_only`) dumps values into a new file.
async fn handle_folder_copy(
    args: &FolderCopyArgs,
    config: &GapiConfig,
    credentials: &ServiceAccountCredentials,
    values_only: bool,
) -> Result<()> {
    let sheets = SheetsService::new(config, credentials);
    let drive = DriveService::new(config, credentials, Some(&args.user));
    let source = sheets.spreadsheet(&parse_spreadsheet_id(&args.source), None);
    let folder = drive.folder(&args.folder, &args.folder);

    let copy = if values_only {
        source.dump_in(&folder, &args.name, args.dry_run).await?
    } else {
        source.copy_in(&folder, &args.name, args.dry_run).await?
    };
    println!("Created {} ({})", args.name, copy.id());
    Ok(())
}

async fn handle_transfer_csv(
    args: &TransferCsvArgs,
    config: &GapiConfig,
    credentials: &ServiceAccountCredentials,
) -> Result<()> {
    let (Ok(delimiter), Ok(quote)) = (u8::try_from(args.delimiter), u8::try_from(args.quote))
    else {
        bail!("Delimiter and quote must be single-byte characters");
    };

    let sheets = SheetsService::new(config, credentials);
    let sheet = sheets
        .spreadsheet(&parse_spreadsheet_id(&args.spreadsheet), None)
        .add_sheet(&args.tab, None);
    let range = TransferredRange::new(&args.source_range, &args.range)?.with_clean(args.clean);
    let task = TransferCsvTask::new(&args.file, vec![TransferDestination::new(sheet, vec![range])])
        .with_delimiter(delimiter)
        .with_quote(quote);

    let options = TaskOptions {
        dryrun: args.dry_run,
        use_testing: args.use_testing,
        ..TaskOptions::default()
    };
    let report = task.run(&options).await?;

    for failure in &report.failures {
        eprintln!(
            "Could not write to {} ({}): {}",
            failure.spreadsheet_id, failure.tab_name, failure.error
        );
    }
    if !report.is_success() {
        bail!("{} destination(s) failed", report.failures.len());
    }
    println!("{} destination(s) written", report.succeeded.len());
    Ok(())
}

async fn handle_backup(
    args: &BackupArgs,
    config: &GapiConfig,
    credentials: &ServiceAccountCredentials,
) -> Result<()> {
    let sheets = SheetsService::new(config, credentials);
    let spreadsheet = sheets.spreadsheet(&parse_spreadsheet_id(&args.spreadsheet), None);
    let date = args
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    let tabs = if args.tabs.is_empty() {
        spreadsheet.load_infos(false).await?;
        spreadsheet.sheets().await
    } else {
        args.tabs
            .iter()
            .map(|tab| spreadsheet.add_sheet(tab, None))
            .collect()
    };

    for sheet in tabs {
        let path = sheet.backup(date).await?;
        println!("{}", path.display());
    }
    Ok(())
}

async fn handle_list_owned(
    args: &ListOwnedArgs,
    config: &GapiConfig,
    credentials: &ServiceAccountCredentials,
) -> Result<()> {
    let drive = DriveService::new(config, credentials, Some(&args.user));
    let files = drive.list_owned_files(&args.user).await?;
    info!("{} files owned by {}", files.len(), args.user);
    for file in files {
        println!(
            "{}\t{}\t{}",
            file.id,
            file.mime_type.as_deref().unwrap_or("-"),
            file.name
        );
    }
    Ok(())
}

async fn handle_mail(
    args: &MailArgs,
    config: &GapiConfig,
    credentials: &ServiceAccountCredentials,
) -> Result<()> {
    let mail = MailService::new(config, credentials, &args.sender);
    let cc: Vec<&str> = args.cc.iter().map(String::as_str).collect();
    let message = mail.build_message(
        &args.to,
        &args.subject,
        &args.body,
        args.reply_to.as_deref(),
        &cc,
        args.attachment.as_deref(),
        None,
    )?;

    let id = if args.trash {
        mail.send_and_trash_message(&message).await?
    } else {
        mail.send_message(&message).await?
    };
    println!("Sent message {id} to {}", message.to);
    Ok(())
}
