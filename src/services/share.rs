// src/services/share.rs

use chrono::Local;

use crate::models::ticket::{ShareLinks, Ticket};

/// Texto da mensagem de WhatsApp. A referência é sempre o custom_id.
pub fn whatsapp_text(ticket: &Ticket, brand: &str) -> String {
    let f = &ticket.fields;
    let date = ticket.created_at.with_timezone(&Local).format("%d/%m/%Y");

    let mut text = format!("📦 *ALBARÁN {}* 📦\n", brand);
    text.push_str(&format!("*Ref:* {}\n", ticket.custom_id));
    text.push_str(&format!("*Fecha:* {}\n\n", date));
    text.push_str(&format!("👤 *Destinatario:* {}\n", f.receiver));
    text.push_str(&format!("📍 *Dirección:* {}\n\n", f.address));
    text.push_str(&format!("📦 *Bultos:* {}\n", f.packages));
    text.push_str(&format!("⚖️ *Peso:* {}\n", f.weight));
    text.push_str(&format!("🚚 *Portes:* {}\n", f.shipping_type));

    if let Some(cod) = f.cod {
        text.push_str(&format!("💰 *REEMBOLSO:* {}€ 💰\n", cod));
    }
    if !f.notes.is_empty() {
        text.push_str(&format!("📝 *Notas:* {}\n", f.notes));
    }

    text.push_str("\n------------------\n");
    text.push_str("Generado por Novapack App");
    text
}

pub fn email_subject(ticket: &Ticket) -> String {
    format!("Albarán Novapack: {}", ticket.fields.receiver)
}

pub fn email_body(ticket: &Ticket) -> String {
    let f = &ticket.fields;
    format!(
        "Hola,\n\nAquí tienes los datos del envío:\n\nRef: {}\nDestinatario: {}\nDirección: {}\nBultos: {}\nPeso: {}\n\nUn saludo.",
        ticket.custom_id, f.receiver, f.address, f.packages, f.weight
    )
}

pub fn share_links(ticket: &Ticket, brand: &str) -> ShareLinks {
    ShareLinks {
        whatsapp_url: format!(
            "https://wa.me/?text={}",
            urlencoding::encode(&whatsapp_text(ticket, brand))
        ),
        mailto_url: format!(
            "mailto:?subject={}&body={}",
            urlencoding::encode(&email_subject(ticket)),
            urlencoding::encode(&email_body(ticket))
        ),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::*;
    use crate::models::ticket::TicketDraft;

    fn ticket(cod: Option<Decimal>, notes: &str) -> Ticket {
        let owner_id = Uuid::new_v4();
        Ticket {
            owner_id,
            custom_id: "MAR-00007".into(),
            ticket_num: 7,
            created_at: Utc::now(),
            fields: TicketDraft {
                receiver: Some("Lucía Martín".into()),
                address: Some("C/ Mayor 12".into()),
                packages: Some(2),
                weight: Some("5kg".into()),
                cod,
                notes: Some(notes.into()),
                ..Default::default()
            }
            .into_fields(),
            printed: false,
            client_id: owner_id,
            client_username: Some("mariogarcia".into()),
        }
    }

    #[test]
    fn whatsapp_text_uses_custom_id_and_optional_lines() {
        let plain = whatsapp_text(&ticket(None, ""), "NOVAPACK");
        assert!(plain.starts_with("📦 *ALBARÁN NOVAPACK* 📦\n*Ref:* MAR-00007\n"));
        assert!(plain.contains("👤 *Destinatario:* Lucía Martín\n"));
        assert!(plain.contains("🚚 *Portes:* Pagados\n"));
        assert!(!plain.contains("REEMBOLSO"));
        assert!(!plain.contains("Notas"));
        assert!(plain.ends_with("Generado por Novapack App"));

        let full = whatsapp_text(&ticket(Some(Decimal::new(2550, 2)), "Frágil"), "NOVAPACK");
        assert!(full.contains("💰 *REEMBOLSO:* 25.50€ 💰\n"));
        assert!(full.contains("📝 *Notas:* Frágil\n"));
    }

    #[test]
    fn links_are_percent_encoded() {
        let links = share_links(&ticket(None, ""), "NOVAPACK");
        assert!(links.whatsapp_url.starts_with("https://wa.me/?text="));
        assert!(!links.whatsapp_url.contains(' '));
        assert!(links.mailto_url.starts_with("mailto:?subject=Albar%C3%A1n%20Novapack%3A%20Luc%C3%ADa%20Mart%C3%ADn&body="));
        assert!(links.mailto_url.contains("MAR-00007"));
    }
}
