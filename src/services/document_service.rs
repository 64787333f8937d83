// src/services/document_service.rs

use chrono::Local;
use genpdf::{elements, style, Alignment, Element};
use image::Luma;
use qrcode::QrCode;
use serde::Serialize;

use crate::{common::error::AppError, models::ticket::Ticket};

// Conteúdo do QR do albarán (chaves curtas para caber num QR pequeno)
#[derive(Debug, Serialize)]
pub struct DeliveryNoteQr<'a> {
    pub id: &'a str,
    pub r: &'a str,
    pub p: i32,
    pub w: &'a str,
    pub d: String,
    pub via: &'static str,
}

// Conteúdo do QR da etiqueta
#[derive(Debug, Serialize)]
pub struct LabelQr<'a> {
    pub id: &'a str,
    pub receiver: &'a str,
    pub address: &'a str,
}

const COPIES: [&str; 2] = ["EJEMPLAR PARA EL CLIENTE", "EJEMPLAR PARA ADMINISTRACIÓN"];

fn print_date(ticket: &Ticket) -> String {
    ticket.created_at.with_timezone(&Local).format("%d/%m/%Y").to_string()
}

pub fn delivery_note_qr(ticket: &Ticket) -> Result<String, AppError> {
    let payload = DeliveryNoteQr {
        id: &ticket.custom_id,
        r: &ticket.fields.receiver,
        p: ticket.fields.packages,
        w: &ticket.fields.weight,
        d: print_date(ticket),
        via: "Novapack App",
    };
    serde_json::to_string(&payload).map_err(|e| AppError::DocumentError(e.to_string()))
}

pub fn label_qr(ticket: &Ticket) -> Result<String, AppError> {
    let payload = LabelQr {
        id: &ticket.custom_id,
        receiver: &ticket.fields.receiver,
        address: &ticket.fields.address,
    };
    serde_json::to_string(&payload).map_err(|e| AppError::DocumentError(e.to_string()))
}

/// Gera os PDFs (albarán e etiqueta). Não toca no armazenamento.
#[derive(Clone)]
pub struct DocumentService {
    fonts_dir: String,
    brand: String,
}

impl DocumentService {
    pub fn new(fonts_dir: impl Into<String>, brand: impl Into<String>) -> Self {
        Self { fonts_dir: fonts_dir.into(), brand: brand.into() }
    }

    fn new_document(&self, title: String) -> Result<genpdf::Document, AppError> {
        // Carrega a fonte da pasta configurada
        let font_family = genpdf::fonts::from_files(&self.fonts_dir, "Roboto", None).map_err(|_| {
            AppError::FontNotFound(format!("Fonte Roboto não encontrada em {}", self.fonts_dir))
        })?;

        let mut doc = genpdf::Document::new(font_family);
        doc.set_title(title);
        let mut decorator = genpdf::SimplePageDecorator::new();
        decorator.set_margins(10);
        doc.set_page_decorator(decorator);
        Ok(doc)
    }

    fn qr_image(payload: &str, scale: f64) -> Result<elements::Image, AppError> {
        let code = QrCode::new(payload.as_bytes())
            .map_err(|e| AppError::DocumentError(e.to_string()))?;

        let image_buffer = code.render::<Luma<u8>>().build();
        let dynamic_image = image::DynamicImage::ImageLuma8(image_buffer);

        Ok(elements::Image::from_dynamic_image(dynamic_image)
            .map_err(|e| AppError::DocumentError(e.to_string()))?
            .with_scale(genpdf::Scale::new(scale, scale)))
    }

    fn render(doc: genpdf::Document) -> Result<Vec<u8>, AppError> {
        let mut buffer = Vec::new();
        doc.render(&mut buffer)
            .map_err(|e| AppError::DocumentError(e.to_string()))?;
        Ok(buffer)
    }

    // =========================================================================
    //  ALBARÁN (duas vias na mesma folha)
    // =========================================================================

    pub fn delivery_note_pdf(&self, ticket: &Ticket) -> Result<Vec<u8>, AppError> {
        let qr_payload = delivery_note_qr(ticket)?;
        let mut doc = self.new_document(format!("Albarán {}", ticket.custom_id))?;

        for (i, copy) in COPIES.iter().enumerate() {
            if i > 0 {
                doc.push(elements::Break::new(1));
                doc.push(elements::Paragraph::new("- - - - - - - - - - - - - - - - - - - - - - - - - - - - - -"));
                doc.push(elements::Break::new(1));
            }
            self.push_delivery_copy(&mut doc, ticket, &qr_payload, copy)?;
        }

        Self::render(doc)
    }

    fn push_delivery_copy(
        &self,
        doc: &mut genpdf::Document,
        ticket: &Ticket,
        qr_payload: &str,
        copy: &str,
    ) -> Result<(), AppError> {
        let f = &ticket.fields;
        let bold = style::Style::new().bold();

        // --- CABEÇALHO: marca + QR | número e data ---
        let mut header = elements::TableLayout::new(vec![1, 1, 2]);
        header
            .row()
            .element(elements::Paragraph::new(self.brand.as_str()).styled(bold.with_font_size(18)))
            .element(Self::qr_image(qr_payload, 0.5)?)
            .element(
                elements::LinearLayout::vertical()
                    .element(elements::Paragraph::new(format!("Nº Albarán: {}", ticket.custom_id)).styled(bold))
                    .element(elements::Paragraph::new(format!("Fecha: {}", print_date(ticket)))),
            )
            .push()
            .map_err(|e| AppError::DocumentError(e.to_string()))?;
        doc.push(header);
        doc.push(elements::Break::new(1));

        // --- PARTES ---
        let mut parties = elements::TableLayout::new(vec![1, 3]);
        parties.set_cell_decorator(elements::FrameCellDecorator::new(false, true, false));
        let rows = [
            ("Remitente:", f.sender.clone()),
            ("Destinatario:", format!("{}\n{}", f.receiver, f.address)),
            ("Portes:", f.shipping_type.clone()),
        ];
        for (label, value) in rows {
            let mut cell = elements::LinearLayout::vertical();
            for line in value.lines() {
                cell.push(elements::Paragraph::new(line));
            }
            parties
                .row()
                .element(elements::Paragraph::new(label).styled(bold))
                .element(cell)
                .push()
                .map_err(|e| AppError::DocumentError(e.to_string()))?;
        }
        doc.push(parties);
        doc.push(elements::Break::new(0.5));

        // --- VOLUMES ---
        let mut load = elements::TableLayout::new(vec![1, 1, 1]);
        load.row()
            .element(elements::Paragraph::new(format!("Bultos: {}", f.packages)))
            .element(elements::Paragraph::new(format!("Peso: {}", f.weight)))
            .element(elements::Paragraph::new(format!("Tamaño: {}", f.size)))
            .push()
            .map_err(|e| AppError::DocumentError(e.to_string()))?;
        doc.push(load);

        if let Some(cod) = f.cod {
            doc.push(elements::Break::new(0.5));
            doc.push(
                elements::Paragraph::new(format!("REEMBOLSO: {} €", cod))
                    .styled(bold.with_font_size(14)),
            );
        }

        if !f.notes.is_empty() {
            doc.push(elements::Break::new(0.5));
            doc.push(elements::Paragraph::new(format!("Notas: {}", f.notes)));
        }

        // --- RODAPÉ: assinatura + via ---
        doc.push(elements::Break::new(1));
        let mut footer = elements::TableLayout::new(vec![2, 1]);
        footer
            .row()
            .element(
                elements::Paragraph::new("Documento generado electrónicamente por Novapack")
                    .styled(style::Style::new().italic().with_font_size(8)),
            )
            .element(
                elements::LinearLayout::vertical()
                    .element(elements::Paragraph::new("FIRMA / SELLO").styled(bold.with_font_size(8)))
                    .element(elements::Break::new(3))
                    .framed(),
            )
            .push()
            .map_err(|e| AppError::DocumentError(e.to_string()))?;
        doc.push(footer);

        doc.push(
            elements::Paragraph::new(copy)
                .aligned(Alignment::Center)
                .styled(bold.with_font_size(8)),
        );

        Ok(())
    }

    // =========================================================================
    //  ETIQUETA 10x15
    // =========================================================================

    pub fn label_pdf(&self, ticket: &Ticket) -> Result<Vec<u8>, AppError> {
        let f = &ticket.fields;
        let bold = style::Style::new().bold();

        let mut doc = self.new_document(format!("Etiqueta {}", ticket.custom_id))?;
        doc.set_paper_size(genpdf::Size::new(100, 150));
        let mut decorator = genpdf::SimplePageDecorator::new();
        decorator.set_margins(5);
        doc.set_page_decorator(decorator);

        doc.push(elements::Paragraph::new(self.brand.as_str()).styled(bold.with_font_size(20)));
        doc.push(elements::Paragraph::new("URGENTE 24H").styled(style::Style::new().with_font_size(10)));
        doc.push(elements::Break::new(1));

        doc.push(elements::Paragraph::new(f.receiver.as_str()).styled(bold.with_font_size(14)));
        doc.push(elements::Paragraph::new(f.address.as_str()).styled(style::Style::new().with_font_size(12)));
        doc.push(elements::Break::new(1));

        let mut figures = elements::TableLayout::new(vec![1, 1, 1]);
        figures.set_cell_decorator(elements::FrameCellDecorator::new(false, true, false));
        figures
            .row()
            .element(elements::Paragraph::new("BULTOS").styled(style::Style::new().with_font_size(8)))
            .element(elements::Paragraph::new("PESO").styled(style::Style::new().with_font_size(8)))
            .element(elements::Paragraph::new("FECHA").styled(style::Style::new().with_font_size(8)))
            .push()
            .map_err(|e| AppError::DocumentError(e.to_string()))?;
        figures
            .row()
            .element(elements::Paragraph::new(f.packages.to_string()).styled(bold.with_font_size(16)))
            .element(elements::Paragraph::new(f.weight.as_str()).styled(bold.with_font_size(16)))
            .element(elements::Paragraph::new(Local::now().format("%d/%m/%Y").to_string()))
            .push()
            .map_err(|e| AppError::DocumentError(e.to_string()))?;
        doc.push(figures);
        doc.push(elements::Break::new(1));

        doc.push(Self::qr_image(&label_qr(ticket)?, 1.0)?.with_alignment(Alignment::Center));
        doc.push(
            elements::Paragraph::new(format!("Ref: {}", ticket.custom_id))
                .aligned(Alignment::Center)
                .styled(style::Style::new().with_font_size(8)),
        );

        if let Some(cod) = f.cod {
            doc.push(elements::Break::new(0.5));
            doc.push(
                elements::Paragraph::new(format!("REEMBOLSO: {}€", cod))
                    .aligned(Alignment::Center)
                    .styled(bold.with_font_size(16))
                    .framed(),
            );
        }

        Self::render(doc)
    }
}
