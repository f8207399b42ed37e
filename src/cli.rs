//! CLI interface for lingua-coach

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::analyzer::DialogAnalyzer;
use crate::chat::{ChatSession, TurnOutcome};
use crate::config::Config;
use crate::filter::KeywordClassifier;
use crate::help::HelpSystem;
use crate::llm::{ChatClient, LanguageModel, ProviderConfig};
use crate::practice::PracticeService;
use crate::scenarios;
use crate::store::LogStore;
use crate::types::Difficulty;

#[derive(Parser)]
#[command(name = "lingua-coach")]
#[command(about = "Scenario-based English practice with personalized error drills", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a role-play dialog
    Chat {
        /// Scenario id (1-5); prompted interactively when omitted
        #[arg(short, long)]
        scenario: Option<u32>,
        /// Difficulty: easy, medium or hard
        #[arg(short, long, default_value = "medium")]
        difficulty: String,
    },
    /// Practice the mistakes recorded in your error profile
    Practice {
        /// Build exercises from templates only, no API calls
        #[arg(long)]
        offline: bool,
    },
    /// Show dialog statistics and the coin balance
    Stats,
    /// List recent dialog transcripts
    History {
        /// Maximum transcripts to show
        #[arg(short, long, default_value = "3")]
        limit: usize,
    },
    /// Configure the app
    Config {
        /// Set the chat API key
        #[arg(long)]
        set_api_key: Option<String>,
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

/// Entry point called from main
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Chat {
            scenario,
            difficulty,
        }) => run_chat(scenario, &difficulty).await,
        Some(Commands::Practice { offline }) => run_practice(offline).await,
        Some(Commands::Stats) => run_stats(),
        Some(Commands::History { limit }) => run_history(limit),
        Some(Commands::Config { set_api_key, show }) => run_config(set_api_key, show),
        None => run_chat(None, "medium").await,
    }
}

fn open_store(config: &Config) -> Result<Arc<LogStore>> {
    let logs_dir = crate::config::data_dir()?.join("logs");
    Ok(Arc::new(LogStore::with_retention(
        logs_dir,
        config.retention.keep_dialogs,
    )?))
}

fn dialog_client(config: &Config) -> Result<ChatClient> {
    let api_key = crate::secrets::get_api_key()?;
    let provider = ProviderConfig::with_base_url(api_key, config.llm.base_url.clone());
    Ok(ChatClient::with_provider(
        provider,
        Some(config.llm.chat_model.clone()),
    ))
}

fn pick_scenario(id: Option<u32>, rl: &mut rustyline::DefaultEditor) -> Result<&'static scenarios::Scenario> {
    if let Some(id) = id {
        return scenarios::by_id(id)
            .with_context(|| format!("unknown scenario id {} (use 1-{})", id, scenarios::SCENARIOS.len()));
    }

    println!("\x1b[1mВыберите сценарий:\x1b[0m");
    for scenario in scenarios::SCENARIOS {
        println!("  {}. {} — {}", scenario.id, scenario.title, scenario.description);
    }

    loop {
        let line = rl.readline("Сценарий (1-5)> ")?;
        if let Ok(id) = line.trim().parse::<u32>() {
            if let Some(scenario) = scenarios::by_id(id) {
                return Ok(scenario);
            }
        }
        println!("Введите число от 1 до {}.", scenarios::SCENARIOS.len());
    }
}

async fn run_chat(scenario_id: Option<u32>, difficulty: &str) -> Result<()> {
    let config = Config::load()?;
    let store = open_store(&config)?;
    let difficulty: Difficulty = difficulty
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let client = Arc::new(dialog_client(&config)?);
    let llm: Arc<dyn LanguageModel> = client;

    let mut rl = rustyline::DefaultEditor::new()?;
    let scenario = pick_scenario(scenario_id, &mut rl)?;

    let mut session = ChatSession::new(
        scenario,
        difficulty,
        store.clone(),
        Arc::new(KeywordClassifier::default()),
        llm.clone(),
    );
    let help = HelpSystem::new(llm.clone(), store.clone());
    let analyzer = DialogAnalyzer::spawn(store.clone(), llm);

    println!();
    println!("\x1b[1mСценарий:\x1b[0m {}", scenario.description);
    println!("\x1b[1mСложность:\x1b[0m {}", difficulty.as_str().to_uppercase());
    match session.hints_remaining() {
        Some(n) => println!("Подсказок доступно: {}", n),
        None => println!("Подсказки не ограничены."),
    }
    println!("Команды: /help /culture /grammar /ask <вопрос> /quit. Начинайте диалог!\n");

    loop {
        let line = match rl.readline("You> ") {
            Ok(line) => line,
            Err(rustyline::error::ReadlineError::Interrupted)
            | Err(rustyline::error::ReadlineError::Eof) => {
                session.save();
                break;
            }
            Err(e) => return Err(e).context("Failed to read input"),
        };
        let line = line.trim().to_string();

        if let Some(rest) = line.strip_prefix('/') {
            let (command, arg) = match rest.split_once(' ') {
                Some((c, a)) => (c, a.trim()),
                None => (rest, ""),
            };
            match command {
                "quit" | "exit" => {
                    session.save();
                    break;
                }
                "help" => {
                    if !session.try_use_hint() {
                        println!("Подсказки закончились для этого уровня сложности.");
                        continue;
                    }
                    match help
                        .help_content(
                            session.messages(),
                            session.scenario().description,
                            session.difficulty(),
                            session.dialog_id(),
                        )
                        .await
                    {
                        Ok(content) => {
                            println!("\x1b[36mПеревод:\x1b[0m {}", content.translation);
                            println!("\x1b[36mВарианты ответа:\x1b[0m");
                            for (i, option) in content.answer_options.iter().enumerate() {
                                println!("  {}. {}", i + 1, option);
                            }
                        }
                        Err(e) => println!("Ошибка при генерации подсказки: {:#}", e),
                    }
                }
                "culture" => {
                    match help
                        .cultural_context(
                            session.messages(),
                            session.scenario().description,
                            session.difficulty(),
                            session.dialog_id(),
                        )
                        .await
                    {
                        Ok(answer) => println!("\x1b[36mКультурный контекст:\x1b[0m {}", answer),
                        Err(e) => println!("Ошибка при генерации культурного контекста: {:#}", e),
                    }
                }
                "grammar" => {
                    match help
                        .grammar_analysis(
                            session.messages(),
                            session.scenario().description,
                            session.difficulty(),
                            session.dialog_id(),
                        )
                        .await
                    {
                        Ok(answer) => println!("\x1b[36mГрамматика:\x1b[0m {}", answer),
                        Err(e) => println!("Ошибка при генерации грамматического разбора: {:#}", e),
                    }
                }
                "ask" if !arg.is_empty() => {
                    match help
                        .ask_assistant(
                            session.messages(),
                            session.scenario().description,
                            session.difficulty(),
                            session.dialog_id(),
                            arg,
                        )
                        .await
                    {
                        Ok(answer) => println!("\x1b[36mПомощник:\x1b[0m {}", answer),
                        Err(e) => println!("Ошибка при запросе к помощнику: {:#}", e),
                    }
                }
                _ => println!("Неизвестная команда: /{}", command),
            }
            continue;
        }

        match session.handle_user_turn(&line).await {
            Ok(TurnOutcome::Ignored) => {}
            Ok(TurnOutcome::Reply(answer)) => println!("\x1b[32mAI:\x1b[0m {}", answer),
            Ok(TurnOutcome::AggressionBlocked { reaction, .. }) => {
                println!("\x1b[33mAI (реакция на грубость):\x1b[0m {}", reaction);
            }
            Ok(TurnOutcome::Completed { farewell }) => {
                println!("\x1b[32mAI:\x1b[0m {}", farewell);
                println!("\n--- Диалог завершён автоматически ---");
                break;
            }
            Ok(TurnOutcome::Exit) => {
                println!("Диалог завершён. До встречи!");
                break;
            }
            Err(e) => println!("Ошибка: {:#}", e),
        }
    }

    // Analyze whatever was said, then let the worker drain before exiting
    if let Err(e) = analyzer.enqueue(session.analysis_job()).await {
        tracing::warn!("Could not queue dialog analysis: {}", e);
    }
    println!("Анализирую ошибки диалога...");
    analyzer.shutdown().await;
    Ok(())
}

async fn run_practice(offline: bool) -> Result<()> {
    let config = Config::load()?;
    let store = open_store(&config)?;

    let service = if offline {
        PracticeService::offline(store.clone(), &config.practice)
    } else {
        match ChatClient::from_config(&config) {
            Ok(client) => PracticeService::new(store.clone(), Arc::new(client), &config.practice),
            Err(_) => {
                println!("API-ключ не настроен, используются шаблонные упражнения.");
                PracticeService::offline(store.clone(), &config.practice)
            }
        }
    };

    let Some(mut session) = service.start_session().await? else {
        println!(
            "Не найдено ошибок для персонализированных упражнений. \
             Пожалуйста, пройдите несколько диалогов."
        );
        return Ok(());
    };

    println!(
        "\x1b[1mСессия практики:\x1b[0m {} упражнений. Пустой ввод — пропустить, 'quit' — выйти.\n",
        session.exercises.len()
    );

    let mut rl = rustyline::DefaultEditor::new()?;
    let mut earned = 0u64;
    let total = session.exercises.len();
    let exercise_ids: Vec<String> = session
        .exercises
        .iter()
        .map(|e| e.exercise_id.clone())
        .collect();

    'outer: for (i, exercise_id) in exercise_ids.iter().enumerate() {
        let (kind, prompt_text) = {
            let exercise = session
                .exercises
                .iter()
                .find(|e| &e.exercise_id == exercise_id)
                .expect("exercise ids come from the session");
            (exercise.exercise_type, exercise.prompt_text.clone())
        };
        println!("\x1b[1m[{}/{}] ({})\x1b[0m {}", i + 1, total, kind, prompt_text);

        loop {
            let answer = match rl.readline("Ответ> ") {
                Ok(line) => line,
                Err(rustyline::error::ReadlineError::Interrupted)
                | Err(rustyline::error::ReadlineError::Eof) => break 'outer,
                Err(e) => return Err(e).context("Failed to read input"),
            };
            let answer = answer.trim();

            if answer.is_empty() {
                println!("Пропущено.\n");
                break;
            }
            if answer.eq_ignore_ascii_case("quit") {
                break 'outer;
            }

            let result = service.grade(&mut session, exercise_id, answer)?;
            println!("{}", result.feedback);
            if result.coins_awarded > 0 {
                earned += result.coins_awarded;
                println!("\x1b[33m+{} монет\x1b[0m", result.coins_awarded);
            }
            println!();

            if result.correct {
                break;
            }
            println!("Попробуйте ещё раз (пустой ввод — пропустить).");
        }
    }

    let ledger = store.load_coins();
    println!(
        "Сессия окончена. Заработано монет: {}. Всего на счету: {}.",
        earned, ledger.coins
    );

    // Sessions do not survive the app closing
    store.wipe_sessions();
    Ok(())
}

fn run_stats() -> Result<()> {
    let config = Config::load()?;
    let store = open_store(&config)?;
    let stats = store.dialog_stats();
    let ledger = store.load_coins();

    println!("\x1b[1mСтатистика\x1b[0m");
    println!("  Диалогов сохранено: {}", stats.total_dialogs);
    println!("  Ошибок записано:    {}", stats.total_errors);
    println!("  Запросов помощи:    {}", stats.total_help_requests);
    println!("  Монет на счету:     {} (всего заработано {})", ledger.coins, ledger.total_earned);

    if !stats.scenarios_used.is_empty() {
        println!("  Сценарии:");
        for (scenario, count) in &stats.scenarios_used {
            println!("    {} × {}", count, scenario);
        }
    }
    if !stats.difficulty_distribution.is_empty() {
        println!("  Сложность:");
        for (difficulty, count) in &stats.difficulty_distribution {
            println!("    {} × {}", count, difficulty);
        }
    }

    let summary = store.error_summary_for_exercises();
    if !summary.recommendations.is_empty() {
        println!("  Рекомендации по последним диалогам:");
        for recommendation in summary.recommendations.iter().take(3) {
            println!("    - {}", recommendation);
        }
    }
    Ok(())
}

fn run_history(limit: usize) -> Result<()> {
    let config = Config::load()?;
    let store = open_store(&config)?;
    let dialogs = store.recent_dialogs(limit);

    if dialogs.is_empty() {
        println!("Сохранённых диалогов нет.");
        return Ok(());
    }

    for dialog in dialogs {
        println!(
            "\x1b[1m{}\x1b[0m [{}] {} — {} сообщений",
            dialog.timestamp.format("%Y-%m-%d %H:%M"),
            dialog.difficulty,
            dialog.scenario,
            dialog.message_count,
        );
    }
    Ok(())
}

fn run_config(set_api_key: Option<String>, show: bool) -> Result<()> {
    if let Some(key) = set_api_key {
        crate::secrets::set_api_key(&key)?;
        println!("API-ключ сохранён.");
        return Ok(());
    }

    if show {
        let config = Config::load()?;
        println!("Конфигурация: {}", crate::config::config_path()?.display());
        println!("  base_url:     {}", config.llm.base_url);
        println!("  chat_model:   {}", config.llm.chat_model);
        println!("  helper_model: {}", config.llm.helper_model);
        println!("  keep_dialogs: {}", config.retention.keep_dialogs);
        println!(
            "  API-ключ:     {}",
            if crate::secrets::has_api_key() { "настроен" } else { "не настроен" }
        );
        return Ok(());
    }

    println!("Используйте --set-api-key или --show.");
    Ok(())
}
