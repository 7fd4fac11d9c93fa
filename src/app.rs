use log::{debug, info};

use snafu::{prelude::*, Snafu};

use std::collections::HashSet;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use tirage::{generate_groups, select_examinees, DrawErrors, Drawing, Selection, MAX_ATTEMPTS};

use crate::args::{Args, Command, HistoryKind};

pub mod dashboard;
pub mod history;
pub mod roster;

use crate::app::history::ExamEntry;

#[derive(Debug, Snafu)]
pub enum AppError {
    #[snafu(display("Impossible d'ouvrir le classeur {path}"))]
    OpeningWorkbook {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("La feuille {sheet} est introuvable dans le classeur"))]
    MissingWorksheet { sheet: String },
    #[snafu(display("La feuille {sheet} ne contient pas de ligne d'en-tête"))]
    EmptyWorksheet { sheet: String },
    #[snafu(display("La feuille {sheet} doit contenir les colonnes {columns:?}"))]
    MissingColumns { sheet: String, columns: Vec<String> },
    #[snafu(display("Impossible de lire le fichier d'historique {path}"))]
    ReadingHistory {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Impossible d'écrire le fichier d'historique {path}"))]
    WritingHistory {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Le fichier d'historique {path} est illisible"))]
    ParsingHistory {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Impossible de générer des groupes uniques après {attempts} essais"))]
    ExhaustedAttempts {
        source: DrawErrors,
        attempts: u32,
    },
    #[snafu(display("Exécution interrompue par l'utilisateur"))]
    Aborted {},
    #[snafu(display("Veuillez valider les vérifications avant de lancer un tirage"))]
    ChecksNotConfirmed {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type AppResult<T> = Result<T, AppError>;

/// The outcome of one exam draw, ready for display.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ExamOutcome {
    pub sheet: String,
    pub week: String,
    pub selection: Selection,
}

/// The outcome of one group drawing, ready for display.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct GroupOutcome {
    pub sheet: String,
    pub groups: Drawing,
}

/// End-to-end exam flow: load the unified history, draw among the present
/// and not-yet-selected students of the sheet, persist the extended history.
///
/// Nothing is written when the draw comes back empty, so a failed or empty
/// run leaves the file exactly as it was.
pub fn run_exam_draw(
    workbook: &str,
    history_dir: &Path,
    sheet: &str,
    week: &str,
    reset: bool,
) -> AppResult<ExamOutcome> {
    let history_path = history::exam_history_path(history_dir);
    let mut entries = history::load_exam_history(&history_path)?;
    if reset {
        let before = entries.len();
        entries.retain(|e| e.sheet != sheet);
        info!(
            "run_exam_draw: reset dropped {} record(s) for sheet {}",
            before - entries.len(),
            sheet
        );
    }
    let mut already: HashSet<String> = history::selected_by_sheet(&entries)
        .remove(sheet)
        .unwrap_or_default();
    debug!(
        "run_exam_draw: sheet {}: {} identities already selected",
        sheet,
        already.len()
    );

    let roster = roster::load_presence_roster(workbook, sheet, week)?;
    let selection = select_examinees(&roster, &mut already, &mut rand::rng());

    if !selection.drawn.is_empty() {
        for identity in selection.drawn.iter() {
            entries.push(ExamEntry {
                identity: identity.clone(),
                sheet: sheet.to_string(),
            });
        }
        history::save_exam_history(&entries, &history_path)?;
    }

    Ok(ExamOutcome {
        sheet: sheet.to_string(),
        week: week.to_string(),
        selection,
    })
}

/// End-to-end group flow: load the sheet's drawing history, generate a
/// grouping never produced before, persist the extended history.
pub fn run_group_draw(
    workbook: &str,
    history_dir: &Path,
    sheet: &str,
    num_groups: usize,
    reset: bool,
) -> AppResult<GroupOutcome> {
    let identities = roster::load_identities(workbook, sheet)?;
    let history_path = history::group_history_path(history_dir, sheet);
    let mut past: Vec<Drawing> = if reset {
        info!("run_group_draw: starting over with an empty history for sheet {}", sheet);
        Vec::new()
    } else {
        history::load_group_history(&history_path)?
    };

    let drawing = match generate_groups(
        &identities,
        num_groups,
        &past,
        MAX_ATTEMPTS,
        &mut rand::rng(),
    ) {
        Ok(d) => d,
        Err(e @ DrawErrors::NoUniqueGrouping) => {
            return Err(e).context(ExhaustedAttemptsSnafu {
                attempts: MAX_ATTEMPTS,
            });
        }
        Err(e) => {
            whatever!("Tirage impossible : {}", e)
        }
    };

    past.push(drawing.clone());
    history::save_group_history(&past, &history_path)?;

    Ok(GroupOutcome {
        sheet: sheet.to_string(),
        groups: drawing,
    })
}

/// The pre-flight gate: every question must be answered "oui" before any
/// roster or history file is touched. A "non" aborts; anything else asks
/// again.
pub fn confirm_checks<R: BufRead>(questions: &[String], input: &mut R) -> AppResult<()> {
    println!("Avant de commencer, vérifiez les points suivants :");
    for question in questions {
        loop {
            println!("{} (oui/non)", question);
            let mut line = String::new();
            let n = input
                .read_line(&mut line)
                .whatever_context("Lecture de la réponse impossible")?;
            if n == 0 {
                // End of input counts as a refusal.
                return AbortedSnafu {}.fail();
            }
            match line.trim().to_lowercase().as_str() {
                "oui" => break,
                "non" => {
                    println!("Veuillez corriger ce point avant de relancer la commande.");
                    return AbortedSnafu {}.fail();
                }
                _ => println!("Veuillez répondre par 'oui' ou 'non'."),
            }
        }
    }
    println!("Vérifications terminées.");
    Ok(())
}

fn print_exam_outcome(outcome: &ExamOutcome) {
    let selection = &outcome.selection;
    println!(
        "{} étudiant·es présent·es dans la feuille {}.",
        selection.present_count, outcome.sheet
    );
    println!(
        "Sélection d'un tiers : {} étudiant·es.",
        selection.quota
    );
    if selection.drawn.is_empty() {
        println!("Aucun étudiant éligible ou tous déjà sélectionnés.");
    } else {
        for identity in selection.drawn.iter() {
            println!("- {}", identity);
        }
    }
}

fn print_group_outcome(outcome: &GroupOutcome) {
    for (idx, group) in outcome.groups.iter().enumerate() {
        let rapporteur = group.first().map(String::as_str).unwrap_or("Aucun");
        println!("Groupe {} : {}", idx + 1, group.join(", "));
        println!("  Rapporteur·rice : {}", rapporteur);
    }
}

fn print_exam_history(entries: &[ExamEntry], sheet: Option<&str>) {
    let mut shown: Vec<&ExamEntry> = entries
        .iter()
        .filter(|e| sheet.map(|s| e.sheet == s).unwrap_or(true))
        .collect();
    if shown.is_empty() {
        println!("Aucun étudiant sélectionné pour le moment.");
        return;
    }
    shown.sort_by(|a, b| a.sheet.cmp(&b.sheet));
    for entry in shown {
        println!("{} : {}", entry.sheet, entry.identity);
    }
}

fn print_group_history(past: &[Drawing]) {
    if past.is_empty() {
        println!("Aucun historique trouvé pour cette feuille.");
        return;
    }
    for (idx, drawing) in past.iter().enumerate() {
        println!("Tirage #{}", idx + 1);
        for (gidx, group) in drawing.iter().enumerate() {
            let rapporteur = group.first().map(String::as_str).unwrap_or("Aucun");
            println!(
                "  Groupe {} : {} (Rapporteur·rice : {})",
                gidx + 1,
                group.join(", "),
                rapporteur
            );
        }
    }
}

/// One invocation = one action, run synchronously end to end.
pub fn run(args: &Args) -> AppResult<()> {
    let history_dir = PathBuf::from(&args.history_dir);
    match &args.command {
        Command::Sheets => {
            for name in roster::list_sheets(&args.workbook)? {
                println!("{}", name);
            }
            Ok(())
        }
        Command::Weeks { sheet } => {
            for name in roster::week_columns(&args.workbook, sheet)? {
                println!("{}", name);
            }
            Ok(())
        }
        Command::Exam { sheet, week, reset } => {
            let questions = vec![
                format!(
                    "L'appel a-t-il été fait sur la feuille {} et le classeur a-t-il été enregistré ?",
                    sheet
                ),
                format!("La colonne de présence {} est-elle la bonne ?", week),
            ];
            confirm_checks(&questions, &mut std::io::stdin().lock())?;
            let outcome = run_exam_draw(&args.workbook, &history_dir, sheet, week, *reset)?;
            print_exam_outcome(&outcome);
            Ok(())
        }
        Command::Groups {
            sheet,
            count,
            reset,
        } => {
            let questions = vec![
                format!(
                    "L'appel a-t-il été fait sur la feuille {} et le classeur a-t-il été enregistré ?",
                    sheet
                ),
                format!("Le nombre de groupes ({}) est-il correct ?", count),
            ];
            confirm_checks(&questions, &mut std::io::stdin().lock())?;
            let outcome =
                run_group_draw(&args.workbook, &history_dir, sheet, *count as usize, *reset)?;
            print_group_outcome(&outcome);
            Ok(())
        }
        Command::History { kind } => match kind {
            HistoryKind::Exam { sheet } => {
                let path = history::exam_history_path(&history_dir);
                let entries = history::load_exam_history(&path)?;
                print_exam_history(&entries, sheet.as_deref());
                Ok(())
            }
            HistoryKind::Groups { sheet } => {
                let path = history::group_history_path(&history_dir, sheet);
                let past = history::load_group_history(&path)?;
                print_group_history(&past);
                Ok(())
            }
        },
        Command::Migrate { sheet, file } => {
            let unified = history::exam_history_path(&history_dir);
            let count =
                history::import_legacy_exam_history(Path::new(file), sheet, &unified)?;
            println!(
                "{} sélection(s) importée(s) depuis {} pour la feuille {}.",
                count, file, sheet
            );
            Ok(())
        }
        Command::Serve { addr } => {
            dashboard::serve(addr, args.workbook.clone(), history_dir)
        }
    }
}
