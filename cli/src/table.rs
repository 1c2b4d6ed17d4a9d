// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{io, marker::PhantomData};

use colored::{Color, Colorize};
use unicode_width::UnicodeWidthStr;

pub struct Table<'a, T, C: Column<T>> {
    pub columns: Vec<C>,
    pub separator: String,
    pub padding: bool,
    pub data: &'a [T],
}

impl<'a, T, C: Column<T>> Table<'a, T, C> {
    pub fn new(columns: Vec<C>, data: &'a [T]) -> Self {
        Self {
            columns,
            separator: "  ".to_string(),
            padding: true,
            data,
        }
    }

    pub fn write_to(&self, w: &mut impl io::Write) -> Result<(), Box<dyn std::error::Error>> {
        if self.data.is_empty() || self.columns.is_empty() {
            return Ok(());
        }

        let table: Vec<Vec<String>> = self
            .data
            .iter()
            .map(|row| self.columns.iter().map(|col| col.format(row)).collect())
            .collect();

        let columns = self.compute_columns(&table);

        for (cells, row) in table.into_iter().zip(self.data) {
            for (j, (col, cell)) in columns.iter().zip(cells).enumerate() {
                write!(w, "{}", col.stylize_cell(row, cell))?;

                if j < columns.len() - 1 {
                    write!(w, "{}", self.separator)?;
                } else {
                    writeln!(w)?;
                }
            }
        }

        Ok(())
    }

    fn compute_columns(&self, table: &[Vec<String>]) -> Vec<ColumnStylizer<'_, T, C>> {
        let max_lengths = self.padding.then(|| get_column_max_width(table));

        let last = self.columns.len() - 1;
        self.columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let direction = col.padding_direction();
                // Left-aligned last column needs no trailing spaces
                let padding = match &max_lengths {
                    Some(_) if i == last && direction == PaddingDirection::Left => None,
                    Some(widths) => Some((widths[i], direction)),
                    None => None,
                };
                ColumnStylizer {
                    config: col,
                    padding,
                    _marker: PhantomData,
                }
            })
            .collect()
    }
}

pub trait Column<T> {
    fn format(&self, data: &T) -> String;

    fn padding_direction(&self) -> PaddingDirection {
        PaddingDirection::Left
    }

    fn get_color(&self, _data: &T) -> Option<Color> {
        None
    }
}

#[derive(Debug, Clone)]
struct ColumnStylizer<'a, T, C: Column<T>> {
    config: &'a C,
    /// padding width and direction
    padding: Option<(usize, PaddingDirection)>,
    _marker: PhantomData<T>,
}

impl<T, C: Column<T>> ColumnStylizer<'_, T, C> {
    fn stylize_cell(&self, data: &T, cell: String) -> String {
        let cell = match self.padding {
            Some((width, direction)) => pad(&cell, width, direction),
            None => cell,
        };

        match self.config.get_color(data) {
            Some(color) => cell.color(color).to_string(),
            None => cell,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddingDirection {
    Left,
    Right,
}

// `format!` pads by chars, not display width
fn pad(cell: &str, width: usize, direction: PaddingDirection) -> String {
    let fill = " ".repeat(width.saturating_sub(cell.width()));
    match direction {
        PaddingDirection::Left => format!("{cell}{fill}"),
        PaddingDirection::Right => format!("{fill}{cell}"),
    }
}

fn get_column_max_width(table: &[Vec<String>]) -> Vec<usize> {
    let mut max_width = vec![0; table.first().map_or(0, Vec::len)];
    for row in table {
        for (i, cell) in row.iter().enumerate() {
            max_width[i] = max_width[i].max(cell.width());
        }
    }
    max_width
}
