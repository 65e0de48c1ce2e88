//! Prompt templates sent to the model.

pub fn query_prompt(context: &str, question: &str) -> String {
    format!(
        "Tu es un assistant d'analyse de sondages pour DooDates. \
Réponds en français, de manière concise et factuelle, en t'appuyant uniquement \
sur les données fournies. Cite les chiffres utiles. Signale une tendance, une \
majorité nette ou une anomalie quand les données le justifient.\n\n\
Données du sondage:\n{context}\n\
Question de l'utilisateur: {question}\n\n\
Réponse:"
    )
}

pub fn auto_insights_prompt(context: &str) -> String {
    format!(
        "Tu es un assistant d'analyse de sondages pour DooDates. \
À partir des données ci-dessous, produis entre 3 et 5 observations clés.\n\n\
Données du sondage:\n{context}\n\
Réponds UNIQUEMENT avec un tableau JSON de la forme:\n\
[{{\"type\": \"trend\" | \"anomaly\" | \"insight\" | \"recommendation\", \
\"title\": \"titre court\", \"description\": \"une ou deux phrases\", \
\"confidence\": nombre entre 0 et 100}}]"
    )
}
