//! Prompt templates for every model call
//!
//! The section markers are part of the data format: downstream parsing
//! (help payloads, analysis summaries) splits on them, so they must stay in
//! sync with the builders here.

use crate::types::Difficulty;

/// Sentinel the analysis model emits when the user made no mistakes
pub const NO_ERRORS_SENTINEL: &str = "ОШИБОК_НЕТ";
/// Marker preceding exercise topics in an analysis summary
pub const TOPICS_MARKER: &str = "ТЕМЫ_ДЛЯ_ЗАДАНИЙ:";
/// Marker preceding study recommendations in an analysis summary
pub const RECOMMENDATIONS_MARKER: &str = "РЕКОМЕНДАЦИИ:";
/// Marker preceding the translation in a help payload
pub const TRANSLATION_MARKER: &str = "ПЕРЕВОД:";
/// Marker preceding the graded answer options in a help payload
pub const ANSWER_OPTIONS_MARKER: &str = "ВАРИАНТЫ_ОТВЕТОВ:";

const AGGRESSION_SUFFIX: &str = "\
IMPORTANT: If the user uses aggressive or offensive language towards you (based on \
your current role), you MUST react according to your role's personality as defined \
in the aggression response for this scenario. Do not ignore it. The user's message \
will be pre-screened, but you should still be aware of this behavior.";

/// Role-play system prompt for a dialog
pub fn system_prompt(
    scenario_description: &str,
    difficulty: Difficulty,
    aggression_response: Option<&str>,
) -> String {
    let mut prompt = format!(
        "You are strictly playing the role described in this scenario: {}\n\
         Never break character.\n\
         Difficulty level: {}\n\
         Instructions: {}\n\
         Keep responses conversational and engaging. Wait for the user to initiate \
         the conversation.",
        scenario_description,
        difficulty.as_str().to_uppercase(),
        difficulty.instructions(),
    );

    if aggression_response.is_some() {
        prompt.push_str("\n\n");
        prompt.push_str(AGGRESSION_SUFFIX);
    }

    prompt
}

/// Post-dialog error analysis over all user messages.
/// The response format is parsed by the store's summary extraction.
pub fn error_analysis_prompt(
    scenario: &str,
    difficulty: Difficulty,
    user_messages: &[String],
) -> String {
    let numbered: Vec<String> = user_messages
        .iter()
        .enumerate()
        .map(|(i, msg)| format!("{}. {}", i + 1, msg))
        .collect();

    format!(
        "Проанализируй все сообщения пользователя из диалога на английском языке \
         на предмет ошибок:\n\n\
         Сценарий: {scenario}\n\
         Уровень сложности: {difficulty}\n\n\
         Сообщения пользователя:\n{messages}\n\n\
         Создай детальную сводку ошибок в формате:\n\n\
         ОБЩИЕ_ОШИБКИ: [перечисли основные типы ошибок, которые повторяются]\n\n\
         КОНКРЕТНЫЕ_ОШИБКИ:\n\
         [Для каждого сообщения с ошибками:]\n\
         Сообщение N: \"оригинальный текст\"\n\
         Ошибки: [список ошибок]\n\
         Исправления: [правильный вариант]\n\n\
         {recommendations} [что нужно изучить/повторить пользователю]\n\n\
         {topics} [конкретные темы для создания упражнений]\n\n\
         Если ошибок нет - напиши \"{no_errors}\"",
        scenario = scenario,
        difficulty = difficulty,
        messages = numbered.join("\n"),
        recommendations = RECOMMENDATIONS_MARKER,
        topics = TOPICS_MARKER,
        no_errors = NO_ERRORS_SENTINEL,
    )
}

/// Structured error classification: asks for a pure JSON array so detections
/// can be upserted into the error profile. Anything unparseable is treated
/// as "no errors found".
pub fn error_classification_prompt(user_messages: &[String]) -> String {
    let numbered: Vec<String> = user_messages
        .iter()
        .enumerate()
        .map(|(i, msg)| format!("{}. {}", i + 1, msg))
        .collect();

    format!(
        "Найди грамматические и лексические ошибки в сообщениях пользователя \
         на английском языке.\n\n\
         Сообщения:\n{}\n\n\
         Ответь ТОЛЬКО JSON-массивом без пояснений. Каждый элемент:\n\
         {{\"original_phrase\": \"фраза с ошибкой\", \"error_type\": \"краткий тип \
         ошибки на английском, например verb_agreement\", \"explanation\": \
         \"объяснение на русском\", \"correction\": \"исправленный вариант\"}}\n\n\
         Если ошибок нет, ответь пустым массивом [].",
        numbered.join("\n"),
    )
}

/// Should-the-dialog-end check; the model answers ДА or НЕТ
pub fn completion_check_prompt(
    scenario: &str,
    recent_context: &str,
    last_user_message: &str,
) -> String {
    format!(
        "Проанализируй диалог и определи, нужно ли его завершить:\n\n\
         Сценарий: {scenario}\n\
         Последние сообщения:\n{context}\n\
         Последнее сообщение пользователя: {last}\n\n\
         КРИТЕРИИ для завершения (ХОТЯ БЫ 2 из 3 должны выполняться):\n\
         1. Пользователь явно показывает что хочет закончить (прощается: \"bye\", \
         \"see you\", \"thanks\")\n\
         2. Цель сценария достигнута (заказ оформлен, регистрация завершена, \
         проблема решена)\n\
         3. В диалоге нет открытых вопросов или ожидающих действий\n\n\
         Ответь ТОЛЬКО: ДА (если нужно завершить) или НЕТ (если продолжать)",
        scenario = scenario,
        context = recent_context,
        last = last_user_message,
    )
}

/// In-character farewell generation for an auto-completed dialog
pub fn completion_message_prompt(scenario: &str, recent_context: &str) -> String {
    format!(
        "Сгенерируй естественное завершающее сообщение для диалога:\n\n\
         Сценарий: {scenario}\n\
         Последние сообщения:\n{context}\n\n\
         Сообщение должно:\n\
         1. Естественно завершать диалог\n\
         2. Быть в характере роли из сценария\n\
         3. Подводить итог или прощаться\n\
         4. Быть на английском языке\n\n\
         Ответь только текстом сообщения, без дополнительных объяснений.",
        scenario = scenario,
        context = recent_context,
    )
}

/// Combined hint payload: translation of the last assistant message plus
/// three graded answer options
pub fn help_prompt(
    scenario: &str,
    difficulty: Difficulty,
    recent_context: &str,
    last_assistant_message: &str,
) -> String {
    format!(
        "Сценарий: {scenario}\n\
         Уровень сложности: {difficulty}\n\
         Последние сообщения диалога (для общего понимания контекста):\n{context}\n\n\
         Сообщение от AI, которое нужно перевести на русский язык: \"{last}\"\n\n\
         Предоставь помощь пользователю в изучении английского языка в следующем формате:\n\n\
         {translation} [Переведи на русский язык ТОЛЬКО указанное выше \"Сообщение от AI, \
         которое нужно перевести\". Если там написано, что сообщений нет, так и укажи.]\n\n\
         {options}\n\
         1. [Простой вариант ответа от лица пользователя на английском языке, подходящий \
         к последнему сообщению AI в диалоге]\n\
         2. [Средний по сложности вариант ответа от лица пользователя на английском языке, \
         подходящий к последнему сообщению AI в диалоге]\n\
         3. [Более продвинутый вариант ответа от лица пользователя на английском языке, \
         подходящий к последнему сообщению AI в диалоге]\n\n\
         ВАЖНО: Варианты ответов должны быть ТОЛЬКО на английском языке. Остальное на русском.",
        scenario = scenario,
        difficulty = difficulty,
        context = recent_context,
        last = last_assistant_message,
        translation = TRANSLATION_MARKER,
        options = ANSWER_OPTIONS_MARKER,
    )
}

/// Cultural-context explanation for a specific assistant message
pub fn cultural_context_prompt(
    scenario: &str,
    difficulty: Difficulty,
    ai_message: &str,
) -> String {
    format!(
        "Проанализируй следующее сообщение от AI из диалога на английском языке и \
         подробно объясни ЛЮБЫЕ культурные отсылки, идиомы, упоминания специфических \
         реалий (например, праздников, традиций, еды, социальных норм, этикета, \
         географических названий с культурным значением, известных личностей или \
         событий) или другие неочевидные моменты, которые могут быть сложны для \
         понимания изучающим язык.\n\
         Будь внимателен даже к мелочам, которые могут иметь культурное значение.\n\
         Если однозначных культурных отсылок нет, кратко укажи, что фраза является \
         стандартной/нейтральной в данном контексте. Не пиши просто \"НЕТ\".\n\
         Ответ дай на русском языке, разбивая длинный текст на абзацы.\n\n\
         Сценарий диалога (для общего понимания): {scenario}\n\
         Уровень сложности: {difficulty}\n\n\
         Сообщение AI для анализа:\n\"{message}\"",
        scenario = scenario,
        difficulty = difficulty,
        message = ai_message,
    )
}

/// Grammar breakdown for a specific assistant message
pub fn grammar_analysis_prompt(
    scenario: &str,
    difficulty: Difficulty,
    ai_message: &str,
) -> String {
    format!(
        "Проанализируй грамматическую структуру следующего сообщения от AI из \
         диалога на английском языке.\n\
         Объясни основные грамматические конструкции, использованные в сообщении \
         (например, время, залог, порядок слов, использование артиклей, модальных \
         глаголов и т.д.).\n\
         Постарайся объяснить так, чтобы было понятно изучающему английский язык. \
         Можно представить в виде: \"Структура: [краткое описание структуры, например, \
         Subject + Verb (Past Simple) + Object]. Ключевые моменты: [пояснения]\".\n\
         Если сообщение очень короткое или грамматически тривиальное, укажи это.\n\
         Ответ дай на русском языке, разбивая длинный текст на абзацы.\n\n\
         Сценарий диалога (для общего понимания): {scenario}\n\
         Уровень сложности: {difficulty}\n\n\
         Сообщение AI для анализа:\n\"{message}\"",
        scenario = scenario,
        difficulty = difficulty,
        message = ai_message,
    )
}

/// Free-form learner question to the study assistant
pub fn assistant_question_prompt(
    scenario: &str,
    difficulty: Difficulty,
    dialog_history: &str,
    question: &str,
) -> String {
    format!(
        "Ты — продвинутый ИИ-помощник. Твоя задача — помочь пользователю разобраться \
         с его вопросом или проблемой, связанной с текущим англоязычным диалогом. \
         Предоставляй углубленные и подробные объяснения на русском языке.\n\n\
         Контекст основного диалога, в котором находится пользователь:\n\
         Событие и роль основного AI-собеседника: \"{scenario}\"\n\
         Уровень сложности диалога: {difficulty}\n\n\
         История основного диалога к текущему моменту:\n{history}\n\n\
         Вопрос пользователя к тебе (ИИ-помощнику): \"{question}\"\n\n\
         Предоставь развернутый и понятный ответ на вопрос пользователя на русском языке.\n\
         При необходимости, можешь ссылаться на историю диалога для полноты ответа.",
        scenario = scenario,
        difficulty = difficulty,
        history = dialog_history,
        question = question,
    )
}
